//! Seckill Server - 秒杀订单准入管线
//!
//! # 架构概述
//!
//! 在限量代金券的并发抢购场景下，保证：
//!
//! - **不超卖** (`admission`): 库存扣减与一人一单去重是共享存储侧的
//!   一次不可分割操作
//! - **一人一单** (`admission` + `consumer`): 准入集合去重 + 落库前
//!   用户级租约锁与单事务唯一性校验双重兜底
//! - **低延迟** (`intake`): 准入同步返回订单 id，落库由有界队列
//!   解耦异步完成
//! - **跨进程协调** (`store`): 正确性边界由共享存储裁决，与进程数无关
//!
//! # 模块结构
//!
//! ```text
//! seckill-server/src/
//! ├── core/          # 配置、服务级错误
//! ├── store/         # 共享存储接口 (Redis / 内存实现)
//! ├── admission.rs   # 原子准入网关
//! ├── idgen.rs       # 单调递增订单 id
//! ├── lock.rs        # 租约互斥锁
//! ├── intake.rs      # 有界草稿队列
//! ├── consumer.rs    # 订单落库 worker
//! ├── orders/        # redb 订单持久化
//! ├── service.rs     # 服务门面 (装配 + 启停)
//! └── utils/         # 日志
//! ```

pub mod admission;
pub mod consumer;
pub mod core;
pub mod idgen;
pub mod intake;
pub mod lock;
pub mod orders;
pub mod service;
pub mod store;
pub mod utils;

// Re-export 公共类型
pub use admission::{Admission, AdmissionGate};
pub use consumer::OrderConsumer;
pub use core::{Config, SeckillError, SeckillResult};
pub use idgen::{IdError, IdGenerator, IdResult};
pub use intake::{BackpressurePolicy, EnqueueError, IntakeProducer, IntakeQueue, IntakeReceiver};
pub use lock::LeaseLock;
pub use orders::{DeadLetterDraft, OrderStorage, StorageError, StorageResult};
pub use service::SeckillService;
pub use store::{MemoryStore, RedisStore, SeckillStore, StoreError, StoreResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
