//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义分发核心对外暴露的错误语义：模式构造、注册期与分发期三类，彼此独立；
//! - 客户端失败与递归守卫拒绝不在此列，前者在引擎内部重试并吞没，后者以空结果返回。
//!
//! ## 设计要求（What）
//! - 所有错误派生 `thiserror::Error`，满足 `Send + Sync + 'static`；
//! - 处理器自身的失败统一使用 [`HandlerError`]（`anyhow::Error`），由本模块的枚举携带为 `source`。

use thiserror::Error;

/// 处理器、中间件与工厂返回的失败类型。
pub type HandlerError = anyhow::Error;

/// 模式构造失败（编程错误）。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    /// 试图从非对象 JSON 值构造模式。
    #[error("pattern must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

/// 注册期错误：注册调用被中止，快照保持不变。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“注册没能完成”和“分发时某个客户端失败”，前者必须同步抛给注册调用方；
/// - **契约 (What)**：返回该错误时服务快照未被替换，调用前后 `list` 结果一致；
/// - **风险 (Trade-offs)**：`Factory` 保留 `anyhow` 根因链，调用方可用 `{:#}` 打印完整上下文。
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// 处理器解析器找不到指定的模块导出。
    #[error("handler `{export}` not found in module `{module}`")]
    Unresolved { module: String, export: String },

    /// 中间件、客户端或服务端工厂执行失败。
    #[error("factory registered at {pattern} failed")]
    Factory {
        pattern: String,
        #[source]
        source: HandlerError,
    },

    /// 注册所依附的服务已被释放。
    #[error("service released before registration at {pattern}")]
    ServiceReleased { pattern: String },
}

/// 分发期错误：`dispatch` 仅在这些情况下返回 `Err`。
#[derive(Debug, Error)]
pub enum DispatchError {
    /// 请求阶段中间件失败，整个分发中止，后续阶段不再运行。
    #[error("request middleware #{index} at {pattern} failed")]
    RequestMiddleware {
        index: usize,
        pattern: String,
        #[source]
        source: HandlerError,
    },

    /// 作用域所依附的服务已被释放。
    #[error("service released before dispatch")]
    ServiceReleased,
}
