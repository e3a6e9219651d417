pub mod features;
pub mod metrics;
pub mod weather;

pub use features::*;
pub use metrics::*;
pub use weather::*;
