//! Shared types for the seckill platform
//!
//! Domain models and time helpers used by the server crate and by
//! integration tooling.

pub mod models;
pub mod types;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use models::{SeckillVoucher, VoucherOrder};
pub use types::{OrderId, Timestamp, UserId, VoucherId};
