//! Voucher Order Model

use serde::{Deserialize, Serialize};

use crate::types::{OrderId, Timestamp, UserId, VoucherId};
use crate::util::now_millis;

/// 代金券订单
///
/// 同一个结构体既作为准入后的草稿（队列中流转，出队即消费），
/// 也作为最终落库的订单记录。落库后不可变，
/// 每个 `(user_id, voucher_id)` 至多存在一条。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoucherOrder {
    /// Order id from the monotonic generator
    pub id: OrderId,
    pub user_id: UserId,
    pub voucher_id: VoucherId,
    /// Admission time (Unix millis)
    pub create_time: Timestamp,
}

impl VoucherOrder {
    /// 创建一个新的订单草稿（创建时间取当前时刻）
    pub fn new(id: OrderId, user_id: UserId, voucher_id: VoucherId) -> Self {
        Self {
            id,
            user_id,
            voucher_id,
            create_time: now_millis(),
        }
    }
}
