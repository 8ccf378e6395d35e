//! 订单落库 Worker
//!
//! 从 intake 队列逐条消费订单草稿：获取用户级租约锁，二次校验
//! 一人一单，单事务写入订单记录，所有退出路径上释放锁。
//! 锁竞争重试耗尽或写入失败的草稿进入 dead letter 表，
//! 不会被静默丢弃。
//!
//! 单消费者设计：所有落库串行通过一个 worker，二次校验因此无需
//! 自身原子化，代价是落库吞吐被限制为一次一单。

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use shared::VoucherOrder;
use shared::util::now_millis;
use tokio_util::sync::CancellationToken;

use crate::core::Config;
use crate::intake::IntakeReceiver;
use crate::lock::LeaseLock;
use crate::orders::{DeadLetterDraft, OrderStorage};
use crate::store::SeckillStore;

/// 订单落库 Worker
pub struct OrderConsumer {
    store: Arc<dyn SeckillStore>,
    orders: OrderStorage,
    lock_lease: Duration,
    lock_retry_attempts: u32,
    lock_retry_base_delay: Duration,
}

impl OrderConsumer {
    pub fn new(store: Arc<dyn SeckillStore>, orders: OrderStorage, config: &Config) -> Self {
        Self {
            store,
            orders,
            lock_lease: Duration::from_secs(config.lock_lease_secs),
            lock_retry_attempts: config.lock_retry_attempts.max(1),
            lock_retry_base_delay: Duration::from_millis(config.lock_retry_base_delay_ms.max(1)),
        }
    }

    /// 运行 worker（阻塞直到队列关闭或收到 shutdown 信号）
    ///
    /// 收到 shutdown 信号时，先清空队列中已准入的草稿再退出。
    pub async fn run(self, mut rx: IntakeReceiver, shutdown: CancellationToken) {
        tracing::info!("⚡ Order consumer started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Order consumer received shutdown signal, draining queue");
                    while let Some(draft) = rx.try_dequeue() {
                        self.handle_draft(draft).await;
                    }
                    break;
                }
                draft = rx.dequeue() => {
                    let Some(draft) = draft else {
                        tracing::info!("Intake queue closed, order consumer stopping");
                        break;
                    };
                    self.handle_draft(draft).await;
                }
            }
        }

        tracing::info!("Order consumer stopped");
    }

    /// 处理一条草稿：用户级锁 → 二次校验 → 落库
    async fn handle_draft(&self, draft: VoucherOrder) {
        let lock = LeaseLock::new(self.store.clone(), format!("order:{}", draft.user_id));

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match lock.try_lock(self.lock_lease).await {
                Ok(true) => break,
                Ok(false) => {
                    tracing::warn!(
                        order_id = draft.id,
                        user_id = draft.user_id,
                        attempt,
                        "User lease contended"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        order_id = draft.id,
                        user_id = draft.user_id,
                        attempt,
                        error = %e,
                        "Lease acquisition failed"
                    );
                }
            }
            if attempt >= self.lock_retry_attempts {
                self.dead_letter(draft, attempt, "user lease unavailable");
                return;
            }
            tokio::time::sleep(self.backoff_delay(attempt)).await;
        }

        self.finalize(&draft);

        match lock.unlock().await {
            Ok(true) => {}
            Ok(false) => {
                // 租期内没写完，锁已过期甚至易主
                tracing::warn!(
                    order_id = draft.id,
                    user_id = draft.user_id,
                    "User lease expired before release"
                );
            }
            Err(e) => {
                tracing::error!(order_id = draft.id, error = %e, "Lease release failed");
            }
        }
    }

    /// 单事务写入订单：存在性校验与插入在同一个写事务内完成
    fn finalize(&self, draft: &VoucherOrder) {
        match self.orders.insert_order_unique(draft) {
            Ok(true) => {
                tracing::debug!(
                    order_id = draft.id,
                    user_id = draft.user_id,
                    voucher_id = draft.voucher_id,
                    "Order persisted"
                );
            }
            Ok(false) => {
                tracing::warn!(
                    order_id = draft.id,
                    user_id = draft.user_id,
                    voucher_id = draft.voucher_id,
                    "Duplicate draft suppressed at finalization"
                );
            }
            Err(e) => {
                tracing::error!(
                    order_id = draft.id,
                    user_id = draft.user_id,
                    error = %e,
                    "Order persistence failed"
                );
                self.dead_letter(draft.clone(), 1, &format!("storage: {e}"));
            }
        }
    }

    /// 指数退避 + 随机抖动
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.lock_retry_base_delay.as_millis() as u64;
        let backoff = base.saturating_mul(1u64 << (attempt - 1).min(6));
        let jitter = rand::thread_rng().gen_range(0..=base);
        Duration::from_millis(backoff + jitter)
    }

    /// 将无法落库的草稿写入 dead letter 表
    fn dead_letter(&self, draft: VoucherOrder, attempts: u32, reason: &str) {
        let order_id = draft.id;
        let user_id = draft.user_id;
        let entry = DeadLetterDraft {
            draft,
            failed_at: now_millis(),
            attempts,
            reason: reason.to_string(),
        };
        match self.orders.push_dead_letter(&entry) {
            Ok(()) => {
                tracing::error!(order_id, user_id, reason, "Draft dead-lettered");
            }
            Err(e) => {
                tracing::error!(
                    order_id,
                    user_id,
                    reason,
                    error = %e,
                    "Failed to record dead letter"
                );
            }
        }
    }
}
