use crate::intake::BackpressurePolicy;

/// 秒杀服务配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | REDIS_URL | redis://127.0.0.1:6379 | 共享存储地址 |
/// | ORDER_DB_PATH | data/seckill.redb | 订单落库文件路径 |
/// | INTAKE_CAPACITY | 1048576 | 订单草稿队列容量 |
/// | ENQUEUE_POLICY | block | 队列满时策略: block \| timeout \| reject |
/// | ENQUEUE_TIMEOUT_MS | 500 | timeout 策略的入队等待上限(毫秒) |
/// | LOCK_LEASE_SECS | 10 | 用户级租约锁的租期(秒) |
/// | LOCK_RETRY_ATTEMPTS | 3 | 落库时获取租约锁的最大尝试次数 |
/// | LOCK_RETRY_BASE_DELAY_MS | 50 | 重试退避基准延迟(毫秒) |
#[derive(Debug, Clone)]
pub struct Config {
    /// 共享存储 (Redis) 地址
    pub redis_url: String,
    /// 订单数据库文件路径
    pub order_db_path: String,
    /// 订单草稿队列容量
    pub intake_capacity: usize,
    /// 队列满时的入队策略
    pub backpressure: BackpressurePolicy,
    /// 用户级租约锁租期（秒）
    pub lock_lease_secs: u64,
    /// 落库时租约锁最大尝试次数
    pub lock_retry_attempts: u32,
    /// 重试退避基准延迟（毫秒）
    pub lock_retry_base_delay_ms: u64,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let timeout_ms = std::env::var("ENQUEUE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);
        let backpressure = match std::env::var("ENQUEUE_POLICY").as_deref() {
            Ok("timeout") => BackpressurePolicy::BlockWithTimeout(timeout_ms),
            Ok("reject") => BackpressurePolicy::Reject,
            _ => BackpressurePolicy::Block,
        };

        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            order_db_path: std::env::var("ORDER_DB_PATH")
                .unwrap_or_else(|_| "data/seckill.redb".into()),
            intake_capacity: std::env::var("INTAKE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024 * 1024),
            backpressure,
            lock_lease_secs: std::env::var("LOCK_LEASE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            lock_retry_attempts: std::env::var("LOCK_RETRY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            lock_retry_base_delay_ms: std::env::var("LOCK_RETRY_BASE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        }
    }

    /// 使用自定义队列参数覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_intake(mut self, capacity: usize, policy: BackpressurePolicy) -> Self {
        self.intake_capacity = capacity;
        self.backpressure = policy;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
