//! 基于租约的分布式互斥锁
//!
//! 以资源名为键、以共享存储为裁判的互斥：`try_lock` 是一次
//! 非阻塞尝试，失败属于正常结果而不是错误。租约携带过期时间，
//! 持有者崩溃后资源不会被永久占住。
//!
//! 持有者令牌是锁实例创建时生成的随机值，与线程/进程标识无关；
//! `unlock` 只在令牌仍然匹配时生效，过期后被他人重新持有的租约
//! 不会被原持有者误释放。

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::store::{SeckillStore, StoreResult};

const KEY_PREFIX: &str = "lock:";

/// Lease-based lock over the shared store
pub struct LeaseLock {
    store: Arc<dyn SeckillStore>,
    key: String,
    token: String,
}

impl LeaseLock {
    /// 创建某个资源名上的锁实例，并生成本次持有的随机令牌
    pub fn new(store: Arc<dyn SeckillStore>, name: impl AsRef<str>) -> Self {
        Self {
            store,
            key: format!("{KEY_PREFIX}{}", name.as_ref()),
            token: Uuid::new_v4().simple().to_string(),
        }
    }

    /// 尝试获取租约，立即返回；`false` 表示资源当前被他人持有
    pub async fn try_lock(&self, lease: Duration) -> StoreResult<bool> {
        self.store.try_acquire(&self.key, &self.token, lease).await
    }

    /// 释放租约；仅在令牌仍匹配时生效，返回是否真正释放
    pub async fn unlock(&self) -> StoreResult<bool> {
        self.store.release(&self.key, &self.token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test(flavor = "multi_thread")]
    async fn only_one_of_two_concurrent_attempts_wins() {
        let store: Arc<dyn SeckillStore> = Arc::new(MemoryStore::new());
        let a = Arc::new(LeaseLock::new(store.clone(), "order:1"));
        let b = Arc::new(LeaseLock::new(store.clone(), "order:1"));

        let (ra, rb) = tokio::join!(
            {
                let a = a.clone();
                async move { a.try_lock(Duration::from_secs(10)).await.unwrap() }
            },
            {
                let b = b.clone();
                async move { b.try_lock(Duration::from_secs(10)).await.unwrap() }
            }
        );
        assert!(ra ^ rb, "exactly one attempt must win");

        // After the winner releases, the name is acquirable again
        let winner = if ra { a } else { b };
        assert!(winner.unlock().await.unwrap());
        let c = LeaseLock::new(store, "order:1");
        assert!(c.try_lock(Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn stale_holder_cannot_release_reacquired_lease() {
        let store: Arc<dyn SeckillStore> = Arc::new(MemoryStore::new());
        let first = LeaseLock::new(store.clone(), "order:2");
        assert!(first.try_lock(Duration::from_millis(10)).await.unwrap());

        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = LeaseLock::new(store.clone(), "order:2");
        assert!(second.try_lock(Duration::from_secs(10)).await.unwrap());

        // The expired holder's unlock must not free the new lease
        assert!(!first.unlock().await.unwrap());
        let third = LeaseLock::new(store, "order:2");
        assert!(!third.try_lock(Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn locks_on_different_names_are_independent() {
        let store: Arc<dyn SeckillStore> = Arc::new(MemoryStore::new());
        let a = LeaseLock::new(store.clone(), "order:3");
        let b = LeaseLock::new(store, "order:4");

        assert!(a.try_lock(Duration::from_secs(10)).await.unwrap());
        assert!(b.try_lock(Duration::from_secs(10)).await.unwrap());
    }
}
