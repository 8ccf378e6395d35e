//! Seckill Voucher Model

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, VoucherId};

/// 秒杀代金券
///
/// `stock` 为发布时的限量库存，只会被准入网关扣减。
/// 销售窗口为 `[begin_time, end_time)`，毫秒时间戳。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeckillVoucher {
    pub id: VoucherId,
    /// Remaining stock at publication time (never negative)
    pub stock: i64,
    /// Sale window start (inclusive, Unix millis)
    pub begin_time: Timestamp,
    /// Sale window end (exclusive, Unix millis)
    pub end_time: Timestamp,
}

impl SeckillVoucher {
    pub fn new(id: VoucherId, stock: i64, begin_time: Timestamp, end_time: Timestamp) -> Self {
        Self {
            id,
            stock,
            begin_time,
            end_time,
        }
    }

    /// 秒杀是否尚未开始
    pub fn not_started(&self, now: Timestamp) -> bool {
        now < self.begin_time
    }

    /// 秒杀是否已经结束
    pub fn ended(&self, now: Timestamp) -> bool {
        now >= self.end_time
    }
}
