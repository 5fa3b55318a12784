use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 分发核心使用的日志级别。
///
/// # 设计背景（Why）
/// - 与宿主日志体系的 `error/warn/info/debug/silly` 五级语义保持一致，`Silly` 用于逐阶段的匹配计数等高频细节。
///
/// # 契约说明（What）
/// - 变体按“冗长程度”递增排序：`Error < Warn < Info < Debug < Silly`；
/// - 序列化为小写字符串（`"info"`、`"silly"` 等），供外部配置加载器直接反序列化。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Silly,
}

impl LogLevel {
    /// 返回级别的小写名称。
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Silly => "silly",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化字段值。
///
/// - **意图 (Why)**：保留整数、布尔等原始类型，避免在写日志前统一转成字符串；
/// - **契约 (What)**：`Text` 可借用也可拥有，其余变体为 `Copy` 标量。
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue<'a> {
    Text(Cow<'a, str>),
    Bool(bool),
    I64(i64),
    U64(u64),
}

impl fmt::Display for AttributeValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Bool(value) => write!(f, "{value}"),
            Self::I64(value) => write!(f, "{value}"),
            Self::U64(value) => write!(f, "{value}"),
        }
    }
}

impl<'a> From<&'a str> for AttributeValue<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(Cow::Borrowed(value))
    }
}

impl From<String> for AttributeValue<'_> {
    fn from(value: String) -> Self {
        Self::Text(Cow::Owned(value))
    }
}

impl From<bool> for AttributeValue<'_> {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue<'_> {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<u64> for AttributeValue<'_> {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<u32> for AttributeValue<'_> {
    fn from(value: u32) -> Self {
        Self::U64(u64::from(value))
    }
}

impl From<usize> for AttributeValue<'_> {
    fn from(value: usize) -> Self {
        Self::U64(value as u64)
    }
}

/// 单个结构化字段。
///
/// # 契约说明（What）
/// - `key` 取自 [`keys`](super::keys) 中的常量，保持跨调用点的命名一致；
/// - 同一条记录中的键不应重复。
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue<'a> {
    pub key: &'static str,
    pub value: AttributeValue<'a>,
}

impl<'a> KeyValue<'a> {
    /// 构建字段，`value` 通过 `From` 自动适配常用标量。
    pub fn new(key: &'static str, value: impl Into<AttributeValue<'a>>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// 字段集合的借用视图。
pub type AttributeSet<'a> = &'a [KeyValue<'a>];

/// 单条结构化日志记录。
///
/// # 设计背景（Why）
/// - 把消息、级别、目标、错误与字段打包成单一结构，`Logger` 实现只需处理一个入口。
///
/// # 契约说明（What）
/// - **前置条件**：`attributes` 与 `error` 只需在 [`Logger::log`] 调用期间有效；
/// - **后置条件**：记录交给 `Logger` 后视为只读，实现方若需延迟输出必须自行复制。
#[derive(Debug)]
pub struct LogRecord<'a> {
    pub message: Cow<'a, str>,
    pub level: LogLevel,
    pub target: &'static str,
    pub error: Option<&'a (dyn Error + 'static)>,
    pub attributes: AttributeSet<'a>,
}

impl<'a> LogRecord<'a> {
    /// 构建新的日志记录。
    pub fn new(
        message: impl Into<Cow<'a, str>>,
        level: LogLevel,
        target: &'static str,
        error: Option<&'a (dyn Error + 'static)>,
        attributes: AttributeSet<'a>,
    ) -> Self {
        Self {
            message: message.into(),
            level,
            target,
            error,
            attributes,
        }
    }
}

/// 分发核心默认使用的日志目标。
pub const DEFAULT_TARGET: &str = "patmos";

/// 日志能力的核心契约。
///
/// # 设计背景（Why）
/// - 分发核心只依赖“能写出分级结构化事件”这一能力，具体后端（`tracing`、测试录制器等）由宿主在构造时注入；
/// - 日志是纯观测行为，任何实现都不得影响分发控制流。
///
/// # 逻辑解析（How）
/// - `log` 为唯一必需方法；
/// - `enabled` 供调用方在构造昂贵字段（例如消息 JSON）前做短路判断，默认始终启用；
/// - `error`/`warn`/`info`/`debug`/`silly` 为便捷方法，内部构造 [`LogRecord`] 后转发给 `log`。
///
/// # 契约说明（What）
/// - 实现必须 `Send + Sync + 'static`，以 `Arc<dyn Logger>` 形式在并发分发间共享；
/// - 实现应尽量非阻塞。
pub trait Logger: Send + Sync + 'static {
    /// 提交结构化日志。
    fn log(&self, record: &LogRecord<'_>);

    /// 指定级别是否会被输出。
    fn enabled(&self, _level: LogLevel) -> bool {
        true
    }

    /// 输出 ERROR 日志，可附带根因。
    fn error(
        &self,
        message: &str,
        error: Option<&(dyn Error + 'static)>,
        attributes: AttributeSet<'_>,
    ) {
        self.log(&LogRecord::new(
            message,
            LogLevel::Error,
            DEFAULT_TARGET,
            error,
            attributes,
        ));
    }

    /// 输出 WARN 日志。
    fn warn(&self, message: &str, attributes: AttributeSet<'_>) {
        self.log(&LogRecord::new(
            message,
            LogLevel::Warn,
            DEFAULT_TARGET,
            None,
            attributes,
        ));
    }

    /// 输出 INFO 日志。
    fn info(&self, message: &str, attributes: AttributeSet<'_>) {
        self.log(&LogRecord::new(
            message,
            LogLevel::Info,
            DEFAULT_TARGET,
            None,
            attributes,
        ));
    }

    /// 输出 DEBUG 日志。
    fn debug(&self, message: &str, attributes: AttributeSet<'_>) {
        self.log(&LogRecord::new(
            message,
            LogLevel::Debug,
            DEFAULT_TARGET,
            None,
            attributes,
        ));
    }

    /// 输出 SILLY 日志。
    fn silly(&self, message: &str, attributes: AttributeSet<'_>) {
        self.log(&LogRecord::new(
            message,
            LogLevel::Silly,
            DEFAULT_TARGET,
            None,
            attributes,
        ));
    }
}

/// 丢弃所有记录的日志器。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _record: &LogRecord<'_>) {}

    fn enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

/// 按配置级别过滤的日志包装器。
///
/// # 教案式说明
/// - **意图（Why）**：日志级别属于构造期配置，由包装器在入口处统一裁剪，而不是修改全局单例；
/// - **逻辑（How）**：`level <= threshold` 的记录转发给内部日志器，其余直接丢弃；
/// - **契约（What）**：内部日志器自身的 `enabled` 结果同样参与判断。
pub struct LevelFilter {
    inner: Arc<dyn Logger>,
    threshold: LogLevel,
}

impl LevelFilter {
    pub fn new(inner: Arc<dyn Logger>, threshold: LogLevel) -> Self {
        Self { inner, threshold }
    }

    /// 当前生效的阈值。
    pub fn threshold(&self) -> LogLevel {
        self.threshold
    }
}

impl Logger for LevelFilter {
    fn log(&self, record: &LogRecord<'_>) {
        if self.enabled(record.level) {
            self.inner.log(record);
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        level <= self.threshold && self.inner.enabled(level)
    }
}

impl fmt::Debug for LevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelFilter")
            .field("threshold", &self.threshold)
            .finish()
    }
}
