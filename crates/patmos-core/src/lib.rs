#![deny(unsafe_code)]
#![doc = "patmos-core: 基于结构化模式匹配的消息分发核心。"]
#![doc = ""]
#![doc = "== 组成 =="]
#![doc = "1. 模式与匹配：`Pattern` 是键到字面值（或通配符 `*`）的有序映射，`Matcher` 以子集规则判定匹配；"]
#![doc = "2. 路由表：`PatternStore` 为不可变表，`find` 按特异度与插入顺序选出最佳条目，`list` 列出全部匹配；"]
#![doc = "3. 服务与作用域：`Service` 以 `ArcSwap` 持有不可变快照，注册即发布新快照；`Scope` 提供合并模式的注册 API 与递归守卫；"]
#![doc = "4. 分发管线：请求中间件 → 客户端（首个成功者胜出，带重试）→ 响应函数回放。"]
#![doc = ""]
#![doc = "== 外部协作方 =="]
#![doc = "配置读取、日志后端与处理器的动态解析均由宿主负责，核心只消费 `DispatchConfig`、`Logger` 与 `HandlerResolver`。"]

mod engine;
mod matcher;
mod retry;

pub mod config;
pub mod error;
pub mod handler;
pub mod observability;
pub mod pattern;
pub mod plan;
pub mod scope;
pub mod service;
pub mod store;

pub use config::{DispatchConfig, LogConfig};
pub use engine::DispatchPhase;
pub use error::{DispatchError, HandlerError, PatternError, RegistrationError};
pub use handler::{
    BoxHandler, BoxMiddleware, BoxResponseHook, Handler, RequestMiddleware, RequestOutcome,
    ResponseHook, handler_fn, middleware_fn, response_fn,
};
pub use matcher::Matcher;
pub use observability::{LogLevel, Logger};
pub use pattern::{Message, Pattern, WILDCARD};
pub use plan::{HandlerResolver, HandlerSpec, ModuleTable, RegistrationPlan};
pub use retry::RetryPolicy;
pub use scope::{Scope, ScopeKind};
pub use service::{Service, ServiceBuilder, ServiceSnapshot};
pub use store::{Entry, PatternStore};

/// 宏展开所需的依赖路径，不属于公开 API。
#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
