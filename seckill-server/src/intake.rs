//! Bounded order intake queue
//!
//! FIFO hand-off between the many concurrent admission callers and the
//! single finalization worker. The queue is deliberately volatile: it
//! exists to decouple request latency from persistence latency, not to
//! be durable (the dead-letter table covers in-process failures; the
//! residual crash window is documented in DESIGN.md).
//!
//! Backpressure is an explicit, configurable policy instead of an
//! implicit unbounded block: a full queue can block the admission
//! caller, block with a deadline, or reject outright.

use shared::VoucherOrder;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// 队列满时的入队策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    /// 阻塞等待消费者腾出空间（原始行为，可能拖慢准入吞吐）
    #[default]
    Block,
    /// 阻塞至多给定毫秒数，超时返回 [`EnqueueError::Timeout`]
    BlockWithTimeout(u64),
    /// 立即拒绝，返回 [`EnqueueError::Full`]
    Reject,
}

/// Enqueue failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("intake queue is full")]
    Full,

    #[error("intake queue is full (timed out after {0} ms)")]
    Timeout(u64),

    #[error("intake queue is closed")]
    Closed,
}

/// Bounded FIFO intake queue
pub struct IntakeQueue;

impl IntakeQueue {
    /// Create a queue of the given capacity. Returns the cloneable
    /// producer handle and the single consumer handle.
    pub fn bounded(
        capacity: usize,
        policy: BackpressurePolicy,
    ) -> (IntakeProducer, IntakeReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (IntakeProducer { tx, policy }, IntakeReceiver { rx })
    }
}

/// Producer side (one per concurrent admission caller)
#[derive(Clone)]
pub struct IntakeProducer {
    tx: mpsc::Sender<VoucherOrder>,
    policy: BackpressurePolicy,
}

impl IntakeProducer {
    /// Enqueue an admitted draft, applying the configured backpressure
    /// policy when the queue is at capacity.
    pub async fn enqueue(&self, draft: VoucherOrder) -> Result<(), EnqueueError> {
        match self.policy {
            BackpressurePolicy::Block => {
                self.tx.send(draft).await.map_err(|_| EnqueueError::Closed)
            }
            BackpressurePolicy::BlockWithTimeout(ms) => {
                let deadline = std::time::Duration::from_millis(ms);
                match tokio::time::timeout(deadline, self.tx.send(draft)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(EnqueueError::Closed),
                    Err(_) => Err(EnqueueError::Timeout(ms)),
                }
            }
            BackpressurePolicy::Reject => self.tx.try_send(draft).map_err(|e| match e {
                TrySendError::Full(_) => EnqueueError::Full,
                TrySendError::Closed(_) => EnqueueError::Closed,
            }),
        }
    }
}

/// Consumer side (exactly one per service instance)
pub struct IntakeReceiver {
    rx: mpsc::Receiver<VoucherOrder>,
}

impl IntakeReceiver {
    /// Await the next draft in admission order. `None` once every
    /// producer has been dropped and the buffer is drained.
    pub async fn dequeue(&mut self) -> Option<VoucherOrder> {
        self.rx.recv().await
    }

    /// Non-blocking dequeue, used to drain the buffer at shutdown.
    pub fn try_dequeue(&mut self) -> Option<VoucherOrder> {
        match self.rx.try_recv() {
            Ok(draft) => Some(draft),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: i64) -> VoucherOrder {
        VoucherOrder::new(id, id * 10, 1)
    }

    #[tokio::test]
    async fn dequeues_in_enqueue_order() {
        let (producer, mut receiver) = IntakeQueue::bounded(16, BackpressurePolicy::Block);

        for id in 1..=5 {
            producer.enqueue(draft(id)).await.unwrap();
        }
        for id in 1..=5 {
            assert_eq!(receiver.dequeue().await.unwrap().id, id);
        }
    }

    #[tokio::test]
    async fn reject_policy_surfaces_full() {
        let (producer, _receiver) = IntakeQueue::bounded(2, BackpressurePolicy::Reject);

        producer.enqueue(draft(1)).await.unwrap();
        producer.enqueue(draft(2)).await.unwrap();
        assert_eq!(producer.enqueue(draft(3)).await, Err(EnqueueError::Full));
    }

    #[tokio::test]
    async fn timeout_policy_surfaces_timeout_when_consumer_stalls() {
        let (producer, _receiver) = IntakeQueue::bounded(1, BackpressurePolicy::BlockWithTimeout(20));

        producer.enqueue(draft(1)).await.unwrap();
        assert_eq!(producer.enqueue(draft(2)).await, Err(EnqueueError::Timeout(20)));
    }

    #[tokio::test]
    async fn dequeue_returns_none_after_producers_drop() {
        let (producer, mut receiver) = IntakeQueue::bounded(4, BackpressurePolicy::Block);

        producer.enqueue(draft(1)).await.unwrap();
        drop(producer);

        assert_eq!(receiver.dequeue().await.unwrap().id, 1);
        assert!(receiver.dequeue().await.is_none());
    }
}
