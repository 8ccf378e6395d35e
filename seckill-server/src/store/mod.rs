//! Shared-store seam for the admission pipeline
//!
//! Everything the pipeline shares across processes lives behind
//! [`SeckillStore`]: the stock counter and per-voucher membership set
//! (mutated only by the atomic admission operation), the id sequence
//! counters, and the lease locks. The store executes admission as one
//! indivisible operation — the application never evaluates
//! "stock > 0" and "not already ordered" in separate steps.
//!
//! Implementations:
//!
//! | Impl | Backing | Use |
//! |------|---------|-----|
//! | [`RedisStore`] | Redis (Lua scripts) | multi-process deployments |
//! | [`MemoryStore`] | in-process maps | single-process mode and tests |

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use shared::{OrderId, UserId, VoucherId};
use thiserror::Error;

use crate::admission::Admission;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Unexpected store reply: {0}")]
    Protocol(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 共享存储接口
///
/// 所有方法都是原子的：并发调用之间不会观察到中间状态。
#[async_trait]
pub trait SeckillStore: Send + Sync {
    /// Atomic admission: check stock, check per-user membership,
    /// decrement and mark — all in one indivisible store-side step.
    ///
    /// This is the sole write path for stock and membership state.
    async fn admit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
        order_id: OrderId,
    ) -> StoreResult<Admission>;

    /// Atomically increment the named counter and return the new value.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Acquire the lease `key` for `token` if it is free or expired.
    /// Single attempt, never waits; `false` is a normal outcome.
    async fn try_acquire(&self, key: &str, token: &str, lease: Duration) -> StoreResult<bool>;

    /// Release the lease `key` if and only if it is still held by `token`.
    /// Returns whether a live lease was actually released.
    async fn release(&self, key: &str, token: &str) -> StoreResult<bool>;

    /// Seed the stock counter for a voucher and clear its membership set.
    /// Called once at voucher publication, before the sale window opens.
    async fn seed_stock(&self, voucher_id: VoucherId, stock: i64) -> StoreResult<()>;

    /// Current remaining stock for a voucher (`None` if never seeded).
    async fn stock(&self, voucher_id: VoucherId) -> StoreResult<Option<i64>>;
}
