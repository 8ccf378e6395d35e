//! RedisStore integration tests
//!
//! These exercise the Lua-scripted admission, the lease lock and the id
//! counter against a live Redis. They are ignored by default; run them
//! with a local server:
//!
//! ```text
//! REDIS_URL=redis://127.0.0.1:6379 cargo test -p seckill-server --test redis_store -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use seckill_server::{Admission, IdGenerator, LeaseLock, RedisStore, SeckillStore};

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into())
}

async fn connect() -> Arc<RedisStore> {
    Arc::new(
        RedisStore::connect(&redis_url())
            .await
            .expect("redis must be reachable for ignored integration tests"),
    )
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn admission_script_decrements_and_deduplicates() {
    let store = connect().await;
    // Voucher ids in the test range keep reruns independent
    let voucher_id = 910_001;
    store.seed_stock(voucher_id, 2).await.unwrap();

    assert_eq!(
        store.admit(voucher_id, 1, 1).await.unwrap(),
        Admission::Admitted
    );
    assert_eq!(
        store.admit(voucher_id, 1, 2).await.unwrap(),
        Admission::Duplicate
    );
    assert_eq!(
        store.admit(voucher_id, 2, 3).await.unwrap(),
        Admission::Admitted
    );
    assert_eq!(
        store.admit(voucher_id, 3, 4).await.unwrap(),
        Admission::OutOfStock
    );
    assert_eq!(store.stock(voucher_id).await.unwrap(), Some(0));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a running Redis server"]
async fn concurrent_admissions_respect_stock() {
    let store = connect().await;
    let voucher_id = 910_002;
    store.seed_stock(voucher_id, 5).await.unwrap();

    let mut handles = Vec::new();
    for user_id in 1..=30i64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.admit(voucher_id, user_id, user_id).await.unwrap()
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() == Admission::Admitted {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 5);
    assert_eq!(store.stock(voucher_id).await.unwrap(), Some(0));
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn lease_lock_is_exclusive_until_released() {
    let store = connect().await;
    let store: Arc<dyn SeckillStore> = store;

    let first = LeaseLock::new(store.clone(), "itest:order:1");
    let second = LeaseLock::new(store.clone(), "itest:order:1");

    assert!(first.try_lock(Duration::from_secs(10)).await.unwrap());
    assert!(!second.try_lock(Duration::from_secs(10)).await.unwrap());

    // Wrong holder cannot release
    assert!(!second.unlock().await.unwrap());
    assert!(first.unlock().await.unwrap());
    assert!(second.try_lock(Duration::from_secs(10)).await.unwrap());
    assert!(second.unlock().await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn id_generator_is_strictly_increasing() {
    let store = connect().await;
    let id_gen = IdGenerator::new(store);

    let mut previous = 0i64;
    for _ in 0..50 {
        let id = id_gen.next("itest-order").await.unwrap();
        assert!(id > previous);
        previous = id;
    }
}
