//! Redis store implementation
//!
//! Production backing for the admission pipeline. All multi-key
//! decisions run as Lua scripts so the read-modify-write is a single
//! server-side step, regardless of how many server processes issue
//! requests concurrently.
//!
//! # Key layout
//!
//! | Key | Type | Purpose |
//! |-----|------|---------|
//! | `seckill:stock:<voucher>` | string (int) | remaining stock |
//! | `seckill:order:<voucher>` | set of user ids | admission membership |
//! | `icr:<key>:<yyyy:MM:dd>` | string (int) | id sequence counter |
//! | `lock:<name>` | string (token, TTL) | lease lock |

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, Script};
use shared::{OrderId, UserId, VoucherId};

use super::{SeckillStore, StoreError, StoreResult};
use crate::admission::Admission;

const STOCK_KEY_PREFIX: &str = "seckill:stock:";
const ORDER_KEY_PREFIX: &str = "seckill:order:";

/// Atomic admission: stock check + membership check + decrement + mark.
///
/// ARGV: voucher id, user id, order id. Returns 1 when stock is
/// exhausted, 2 when the user already ordered, 0 on admission.
const ADMIT_SCRIPT: &str = r#"
local voucherId = ARGV[1]
local userId = ARGV[2]
local stockKey = 'seckill:stock:' .. voucherId
local orderKey = 'seckill:order:' .. voucherId
if (tonumber(redis.call('get', stockKey) or '0') <= 0) then
    return 1
end
if (redis.call('sismember', orderKey, userId) == 1) then
    return 2
end
redis.call('incrby', stockKey, -1)
redis.call('sadd', orderKey, userId)
return 0
"#;

/// Compare-token-then-delete release. A lease that expired and was
/// re-acquired by another holder carries a different token and is left
/// untouched. Returns the number of keys deleted (0 or 1).
const UNLOCK_SCRIPT: &str = r#"
if (redis.call('get', KEYS[1]) == ARGV[1]) then
    return redis.call('del', KEYS[1])
end
return 0
"#;

/// Redis-backed [`SeckillStore`]
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    admit_script: Script,
    unlock_script: Script,
}

impl RedisStore {
    /// Connect with a reconnecting connection manager.
    ///
    /// 连接失败快速暴露：请求路径上的准入操作不做内部重试
    /// （重试需要新的订单 id，由调用方决定）。
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500));

        let client = Client::open(redis_url)?;
        let conn = client.get_connection_manager_with_config(config).await?;

        Ok(Self {
            conn,
            admit_script: Script::new(ADMIT_SCRIPT),
            unlock_script: Script::new(UNLOCK_SCRIPT),
        })
    }

    fn stock_key(voucher_id: VoucherId) -> String {
        format!("{STOCK_KEY_PREFIX}{voucher_id}")
    }

    fn order_key(voucher_id: VoucherId) -> String {
        format!("{ORDER_KEY_PREFIX}{voucher_id}")
    }
}

#[async_trait]
impl SeckillStore for RedisStore {
    async fn admit(
        &self,
        voucher_id: VoucherId,
        user_id: UserId,
        order_id: OrderId,
    ) -> StoreResult<Admission> {
        let mut conn = self.conn.clone();
        let code: i64 = self
            .admit_script
            .arg(voucher_id)
            .arg(user_id)
            .arg(order_id)
            .invoke_async(&mut conn)
            .await?;
        Admission::from_code(code)
            .ok_or_else(|| StoreError::Protocol(format!("admission script returned {code}")))
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn try_acquire(&self, key: &str, token: &str, lease: Duration) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("EX")
            .arg(lease.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release(&self, key: &str, token: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .unlock_script
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }

    async fn seed_stock(&self, voucher_id: VoucherId, stock: i64) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .set(Self::stock_key(voucher_id), stock)
            .del(Self::order_key(voucher_id))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn stock(&self, voucher_id: VoucherId) -> StoreResult<Option<i64>> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = redis::cmd("GET")
            .arg(Self::stock_key(voucher_id))
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }
}
