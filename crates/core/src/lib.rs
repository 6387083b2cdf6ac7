pub mod error;
pub mod model;
pub mod quiz;
pub mod reconcile;
pub mod scheduler;
pub mod time;

pub use error::Error;
pub use time::Clock;
