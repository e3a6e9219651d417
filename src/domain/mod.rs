pub mod columns;
pub mod observation;

pub use columns::*;
pub use observation::*;
