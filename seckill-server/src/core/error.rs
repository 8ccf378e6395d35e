use shared::VoucherId;
use thiserror::Error;

use crate::idgen::IdError;
use crate::intake::EnqueueError;
use crate::orders::StorageError;
use crate::store::StoreError;

/// 秒杀服务错误
///
/// 前四个变体是同步返回给用户的正常业务结果（不重试、不告警）；
/// 其余为基础设施故障，向调用方暴露为失败并记录日志。
#[derive(Debug, Error)]
pub enum SeckillError {
    #[error("秒杀尚未开始")]
    SaleNotStarted,

    #[error("秒杀已经结束")]
    SaleEnded,

    #[error("库存不足")]
    OutOfStock,

    #[error("不能重复下单")]
    DuplicateOrder,

    #[error("优惠券不存在: {0}")]
    VoucherNotFound(VoucherId),

    #[error("Id generation failed: {0}")]
    Id(#[from] IdError),

    #[error("Shared store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Order intake failed: {0}")]
    Intake(#[from] EnqueueError),

    #[error("Order storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl SeckillError {
    /// 是否属于面向用户的正常拒绝（而非基础设施故障）
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SeckillError::SaleNotStarted
                | SeckillError::SaleEnded
                | SeckillError::OutOfStock
                | SeckillError::DuplicateOrder
                | SeckillError::VoucherNotFound(_)
        )
    }
}

pub type SeckillResult<T> = Result<T, SeckillError>;
