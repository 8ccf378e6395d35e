//! In-process store implementation
//!
//! Backs single-process deployments and the test suite. Provides the
//! same atomicity contract as the Redis implementation: the admission
//! sequence (stock check, membership check, decrement, mark) runs under
//! one mutex, so concurrent callers never interleave with its
//! read-modify-write. Counters and leases use lock-free maps since each
//! operation touches a single key.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::{OrderId, UserId, VoucherId};
use tokio::sync::Mutex;

use super::{SeckillStore, StoreResult};
use crate::admission::Admission;

/// Per-voucher admission state (stock + membership set)
#[derive(Debug, Default)]
struct VoucherState {
    stock: i64,
    users: HashSet<UserId>,
}

/// A held lease
#[derive(Debug)]
struct Lease {
    token: String,
    expires_at: Instant,
}

/// In-memory [`SeckillStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// stock + membership，准入操作的原子性由这把锁保证
    vouchers: Mutex<HashMap<VoucherId, VoucherState>>,
    counters: DashMap<String, i64>,
    leases: DashMap<String, Lease>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SeckillStore for MemoryStore {
    async fn admit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
        _order_id: OrderId,
    ) -> StoreResult<Admission> {
        // Same evaluation order as the Lua script: stock first, then
        // membership. An unseeded voucher reads as zero stock.
        let mut vouchers = self.vouchers.lock().await;
        let Some(state) = vouchers.get_mut(&voucher_id) else {
            return Ok(Admission::OutOfStock);
        };
        if state.stock <= 0 {
            return Ok(Admission::OutOfStock);
        }
        if state.users.contains(&user_id) {
            return Ok(Admission::Duplicate);
        }
        state.stock -= 1;
        state.users.insert(user_id);
        Ok(Admission::Admitted)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut entry = self.counters.entry(key.to_string()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn try_acquire(&self, key: &str, token: &str, lease: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        let fresh = Lease {
            token: token.to_string(),
            expires_at: now + lease,
        };
        match self.leases.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    Ok(false)
                } else {
                    occupied.insert(fresh);
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str, token: &str) -> StoreResult<bool> {
        let now = Instant::now();
        match self.leases.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                // An expired lease reads as absent, matching Redis TTL
                // semantics: the original holder cannot release it.
                if occupied.get().token == token && occupied.get().expires_at > now {
                    occupied.remove();
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn seed_stock(&self, voucher_id: VoucherId, stock: i64) -> StoreResult<()> {
        let mut vouchers = self.vouchers.lock().await;
        vouchers.insert(
            voucher_id,
            VoucherState {
                stock,
                users: HashSet::new(),
            },
        );
        Ok(())
    }

    async fn stock(&self, voucher_id: VoucherId) -> StoreResult<Option<i64>> {
        let vouchers = self.vouchers.lock().await;
        Ok(vouchers.get(&voucher_id).map(|state| state.stock))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_admissions_never_oversell() {
        let store = Arc::new(MemoryStore::new());
        store.seed_stock(1, 5).await.unwrap();

        let mut handles = Vec::new();
        for user_id in 0..50i64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.admit(1, user_id, user_id + 1000).await.unwrap()
            }));
        }

        let mut admitted = 0;
        let mut out_of_stock = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Admission::Admitted => admitted += 1,
                Admission::OutOfStock => out_of_stock += 1,
                Admission::Duplicate => panic!("distinct users cannot be duplicates"),
            }
        }

        assert_eq!(admitted, 5);
        assert_eq!(out_of_stock, 45);
        assert_eq!(store.stock(1).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn same_user_is_admitted_once() {
        let store = MemoryStore::new();
        store.seed_stock(7, 10).await.unwrap();

        assert_eq!(store.admit(7, 42, 1).await.unwrap(), Admission::Admitted);
        assert_eq!(store.admit(7, 42, 2).await.unwrap(), Admission::Duplicate);
        assert_eq!(store.stock(7).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn unseeded_voucher_is_out_of_stock() {
        let store = MemoryStore::new();
        assert_eq!(store.admit(99, 1, 1).await.unwrap(), Admission::OutOfStock);
    }

    #[tokio::test]
    async fn expired_lease_can_be_reacquired() {
        let store = MemoryStore::new();
        assert!(
            store
                .try_acquire("lock:a", "t1", Duration::from_millis(10))
                .await
                .unwrap()
        );
        assert!(
            !store
                .try_acquire("lock:a", "t2", Duration::from_secs(10))
                .await
                .unwrap()
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(
            store
                .try_acquire("lock:a", "t2", Duration::from_secs(10))
                .await
                .unwrap()
        );
        // t1's lease is gone; releasing with the stale token is a no-op
        assert!(!store.release("lock:a", "t1").await.unwrap());
        assert!(store.release("lock:a", "t2").await.unwrap());
    }
}
