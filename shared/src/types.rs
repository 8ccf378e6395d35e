//! Common types for the shared crate

/// Timestamp type (Unix milliseconds)
pub type Timestamp = i64;

/// User identifier (assigned by the identity collaborator upstream)
pub type UserId = i64;

/// Seckill voucher identifier
pub type VoucherId = i64;

/// Order identifier (produced by the monotonic id generator)
pub type OrderId = i64;
