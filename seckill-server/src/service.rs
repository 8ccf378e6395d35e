//! 秒杀服务门面
//!
//! 将准入管线的各组件装配为一个显式持有、显式启停的服务实例
//! （没有全局队列或全局线程池）：
//!
//! ```text
//! purchase(user, voucher)
//!     │  销售窗口校验 (redb 中的代金券定义)
//!     │  订单 id 生成 (共享存储计数器)
//!     ▼
//! AdmissionGate ──原子──▶ 共享存储 (库存 + 一人一单集合)
//!     │ Admitted
//!     ▼
//! IntakeQueue (有界 FIFO) ──▶ OrderConsumer ──▶ redb 订单表
//! ```
//!
//! 准入对调用方同步返回订单 id；落库异步完成，`ADMITTED` 之后
//! 立即查询订单可能尚不可见（最终一致）。准入成功后不支持取消。

use std::sync::{Arc, Mutex};

use shared::{OrderId, SeckillVoucher, UserId, VoucherId, VoucherOrder};
use shared::util::now_millis;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::admission::{Admission, AdmissionGate};
use crate::consumer::OrderConsumer;
use crate::core::{Config, SeckillError, SeckillResult};
use crate::idgen::IdGenerator;
use crate::intake::{EnqueueError, IntakeProducer, IntakeQueue};
use crate::orders::{DeadLetterDraft, OrderStorage};
use crate::store::SeckillStore;

/// 秒杀服务实例
///
/// 持有共享存储句柄、准入网关、id 生成器、草稿队列的生产端以及
/// 唯一的落库 worker。生命周期由 [`SeckillService::start`] 与
/// [`SeckillService::shutdown`] 显式管理。
pub struct SeckillService {
    config: Config,
    store: Arc<dyn SeckillStore>,
    gate: AdmissionGate,
    id_gen: IdGenerator,
    orders: OrderStorage,
    /// 入队生产端；shutdown 时取走以关闭队列
    producer: Mutex<Option<IntakeProducer>>,
    consumer_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown_token: CancellationToken,
}

impl SeckillService {
    /// 装配组件并启动落库 worker
    ///
    /// 必须在 Tokio runtime 内调用。
    pub fn start(config: Config, store: Arc<dyn SeckillStore>, orders: OrderStorage) -> Self {
        let (producer, rx) = IntakeQueue::bounded(config.intake_capacity, config.backpressure);
        let shutdown_token = CancellationToken::new();

        let consumer = OrderConsumer::new(store.clone(), orders.clone(), &config);
        let handle = tokio::spawn(consumer.run(rx, shutdown_token.clone()));

        tracing::info!(
            capacity = config.intake_capacity,
            policy = ?config.backpressure,
            "Seckill service started"
        );

        Self {
            gate: AdmissionGate::new(store.clone()),
            id_gen: IdGenerator::new(store.clone()),
            config,
            store,
            orders,
            producer: Mutex::new(Some(producer)),
            consumer_handle: Mutex::new(Some(handle)),
            shutdown_token,
        }
    }

    /// 发布一张代金券：持久化定义并向共享存储预置库存
    ///
    /// 应在销售窗口开启前调用；重复发布会重置库存与去重集合。
    pub async fn publish_voucher(&self, voucher: &SeckillVoucher) -> SeckillResult<()> {
        self.orders.put_voucher(voucher)?;
        self.store.seed_stock(voucher.id, voucher.stock).await?;
        tracing::info!(
            voucher_id = voucher.id,
            stock = voucher.stock,
            "Voucher published"
        );
        Ok(())
    }

    /// 秒杀下单
    ///
    /// 成功返回订单 id（此时订单已被准入、库存已扣减，落库异步
    /// 完成）；[`SeckillError::is_rejection`] 为真的错误是正常的
    /// 用户可见拒绝。
    pub async fn purchase(&self, user_id: UserId, voucher_id: VoucherId) -> SeckillResult<OrderId> {
        let voucher = self
            .orders
            .get_voucher(voucher_id)?
            .ok_or(SeckillError::VoucherNotFound(voucher_id))?;

        let now = now_millis();
        if voucher.not_started(now) {
            return Err(SeckillError::SaleNotStarted);
        }
        if voucher.ended(now) {
            return Err(SeckillError::SaleEnded);
        }

        // 每次尝试生成新的 id：准入不是幂等操作，失败后的重试
        // 必须由调用方带着新 id 重新发起
        let order_id = self.id_gen.next("order").await?;

        match self.gate.admit(voucher_id, user_id, order_id).await? {
            Admission::OutOfStock => return Err(SeckillError::OutOfStock),
            Admission::Duplicate => return Err(SeckillError::DuplicateOrder),
            Admission::Admitted => {}
        }

        let draft = VoucherOrder::new(order_id, user_id, voucher_id);
        if let Err(e) = self.enqueue(draft.clone()).await {
            // 库存已扣减，草稿不能静默丢失：立即进 dead letter
            tracing::error!(
                order_id,
                user_id,
                voucher_id,
                error = %e,
                "Admitted draft could not be queued, dead-lettering"
            );
            self.orders.push_dead_letter(&DeadLetterDraft {
                draft,
                failed_at: now_millis(),
                attempts: 1,
                reason: format!("intake: {e}"),
            })?;
            return Err(e.into());
        }

        tracing::debug!(order_id, user_id, voucher_id, "Order admitted and queued");
        Ok(order_id)
    }

    /// 订单存储句柄（查询订单、dead letter 等）
    pub fn orders(&self) -> &OrderStorage {
        &self.orders
    }

    /// 服务配置
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 优雅关闭：关闭队列入口，等待 worker 清空剩余草稿后退出
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down seckill service...");

        // 取走生产端，后续 purchase 直接得到 Closed
        self.producer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        self.shutdown_token.cancel();

        let handle = self
            .consumer_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = ?e, "Order consumer task panicked");
            }
        }

        tracing::info!("Seckill service stopped");
    }

    async fn enqueue(&self, draft: VoucherOrder) -> Result<(), EnqueueError> {
        let producer = self
            .producer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match producer {
            Some(producer) => producer.enqueue(draft).await,
            None => Err(EnqueueError::Closed),
        }
    }
}
