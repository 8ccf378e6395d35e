//! Configuration and service-level errors

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{SeckillError, SeckillResult};
