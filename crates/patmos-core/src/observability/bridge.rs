use std::fmt::Write as _;

use super::logging::{AttributeSet, LogLevel, LogRecord, Logger};

/// 将 [`LogRecord`] 转发给 `tracing` 生态的日志器。
///
/// # 教案式说明
/// - **意图（Why）**：宿主通常已经安装了 `tracing-subscriber`，分发核心的事件应直接汇入同一条管道；
/// - **逻辑（How）**：按级别选择 `tracing` 宏，`Silly` 映射为 `TRACE`；结构化字段被渲染为
///   `key=value` 序列写入 `fields` 字段，记录自带的 `target` 写入 `log.target` 字段；
/// - **契约（What）**：`enabled` 委托给 `tracing::enabled!`，未安装订阅器时所有级别均视为关闭。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        let fields = render_attributes(record.attributes);
        let message = record.message.as_ref();
        let target = record.target;

        match (record.level, record.error) {
            (LogLevel::Error, Some(error)) => tracing::error!(
                target: "patmos",
                { log.target = target, fields = %fields, error = %error },
                "{message}"
            ),
            (LogLevel::Error, None) => {
                tracing::error!(target: "patmos", { log.target = target, fields = %fields }, "{message}")
            }
            (LogLevel::Warn, _) => {
                tracing::warn!(target: "patmos", { log.target = target, fields = %fields }, "{message}")
            }
            (LogLevel::Info, _) => {
                tracing::info!(target: "patmos", { log.target = target, fields = %fields }, "{message}")
            }
            (LogLevel::Debug, _) => {
                tracing::debug!(target: "patmos", { log.target = target, fields = %fields }, "{message}")
            }
            (LogLevel::Silly, _) => {
                tracing::trace!(target: "patmos", { log.target = target, fields = %fields }, "{message}")
            }
        }
    }

    fn enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Error => tracing::enabled!(target: "patmos", tracing::Level::ERROR),
            LogLevel::Warn => tracing::enabled!(target: "patmos", tracing::Level::WARN),
            LogLevel::Info => tracing::enabled!(target: "patmos", tracing::Level::INFO),
            LogLevel::Debug => tracing::enabled!(target: "patmos", tracing::Level::DEBUG),
            LogLevel::Silly => tracing::enabled!(target: "patmos", tracing::Level::TRACE),
        }
    }
}

fn render_attributes(attributes: AttributeSet<'_>) -> String {
    let mut rendered = String::new();
    for (index, attribute) in attributes.iter().enumerate() {
        if index > 0 {
            rendered.push(' ');
        }
        // 写入 String 不会失败
        let _ = write!(rendered, "{}={}", attribute.key, attribute.value);
    }
    rendered
}
