pub mod config;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod pipeline;
pub mod repo;
pub mod telemetry;
