//! 原子准入网关
//!
//! 库存扣减与一人一单去重的唯一正确性边界。判定由共享存储
//! 在一次不可分割的操作中完成（见 [`SeckillStore::admit`]），
//! 应用侧只负责结果的解码与记录。

use std::sync::Arc;

use shared::{OrderId, UserId, VoucherId};

use crate::store::{SeckillStore, StoreResult};

/// 准入判定结果
///
/// Wire protocol with the store is a single integer:
/// `0` admitted, `1` out of stock, `2` duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// One unit of stock reserved for this user
    Admitted,
    /// Stock exhausted
    OutOfStock,
    /// User already holds an admission for this voucher
    Duplicate,
}

impl Admission {
    /// Decode the store-side integer result
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Admission::Admitted),
            1 => Some(Admission::OutOfStock),
            2 => Some(Admission::Duplicate),
            _ => None,
        }
    }

    /// Store-side integer result
    pub fn code(&self) -> i64 {
        match self {
            Admission::Admitted => 0,
            Admission::OutOfStock => 1,
            Admission::Duplicate => 2,
        }
    }
}

/// Admission gate over the shared store
#[derive(Clone)]
pub struct AdmissionGate {
    store: Arc<dyn SeckillStore>,
}

impl AdmissionGate {
    pub fn new(store: Arc<dyn SeckillStore>) -> Self {
        Self { store }
    }

    /// Run the atomic admission for `(voucher, user)`.
    ///
    /// `order_id` is the id the caller will use if admission succeeds;
    /// it is forwarded to the store so the operation carries the full
    /// admission context.
    pub async fn admit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
        order_id: OrderId,
    ) -> StoreResult<Admission> {
        let verdict = self.store.admit(voucher_id, user_id, order_id).await?;
        tracing::debug!(
            voucher_id,
            user_id,
            order_id,
            verdict = ?verdict,
            "Admission evaluated"
        );
        Ok(verdict)
    }
}
