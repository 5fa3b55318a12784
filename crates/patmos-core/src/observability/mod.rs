//! 可观测性契约：注入式日志能力与 `tracing` 桥接。
//!
//! # 设计缘起（Why）
//! - 分发核心不持有全局日志单例，日志能力在构造服务时注入，级别属于配置；
//! - 核心只定义“需要发出哪些事件”，不规定日志后端。
//!
//! # 总体结构（How）
//! - [`logging`]：`LogLevel`、`LogRecord`、`Logger` 契约以及 `NoopLogger`/`LevelFilter`；
//! - [`bridge`]：把记录转发给 `tracing` 宏的 [`TracingLogger`]；
//! - [`keys`]：结构化字段键常量。

pub mod bridge;
pub mod keys;
pub mod logging;

pub use bridge::TracingLogger;
pub use logging::{
    AttributeSet, AttributeValue, DEFAULT_TARGET, KeyValue, LevelFilter, LogLevel, LogRecord,
    Logger, NoopLogger,
};
