//! # scope 模块说明
//!
//! ## 角色定位（Why）
//! - 作用域是绑定了基础模式的服务视图：注册与查询都会先把基础模式合并进参数；
//! - 中间件与客户端工厂拿到的是绑定在自身注册模式上的作用域，而不是裸引擎，
//!   由此在分发入口处实施递归守卫。
//!
//! ## 设计要求（What）
//! - `Root`/`Server` 作用域没有守卫，分发前把基础模式覆盖进消息；
//! - `Middleware`/`Client` 作用域的守卫模式等于其注册模式：若待分发消息会再次命中该模式，
//!   调用被拒绝（记录 warn，返回 `Ok(None)`）；
//! - 由 `scope()` 派生的子作用域继承父作用域的守卫，收窄基础模式不会放宽守卫；
//! - `force_dispatch` 绕过守卫，直接进入根引擎。
//!
//! ## 生命周期（How）
//! - 作用域只持有服务内部状态的弱引用，可被处理器闭包长期捕获而不形成引用环。

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine;
use crate::error::{DispatchError, HandlerError, RegistrationError};
use crate::handler::{BoxHandler, BoxMiddleware};
use crate::observability::keys::{FIELD_OUTCOME, FIELD_PATTERN, FIELD_REMOVED, FIELD_SCOPE_KIND};
use crate::observability::{KeyValue, Logger, NoopLogger};
use crate::pattern::{Message, Pattern};
use crate::service::ServiceInner;
use crate::store::Entry;

/// 作用域类型。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// 服务根作用域。
    Root,
    /// 交给传输适配器的服务端作用域。
    Server,
    /// 请求中间件工厂收到的作用域。
    Middleware,
    /// 客户端工厂收到的作用域。
    Client,
}

impl ScopeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Server => "server",
            Self::Middleware => "middleware",
            Self::Client => "client",
        }
    }

    /// 是否对分发实施递归守卫。
    pub const fn is_guarded(self) -> bool {
        matches!(self, Self::Middleware | Self::Client)
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 绑定基础模式的服务视图。
///
/// # 教案式说明
/// - **意图 (Why)**：支撑分层注册（整组子资源方法共享同一前缀）并限制中间件/客户端的可见范围；
/// - **契约 (What)**：
///   - 注册与查询的模式按 `pattern.merge(&base)` 合并，基础模式的键优先；
///   - 注册方法返回 `Result<&Self, RegistrationError>`，工厂失败时快照不变；
///   - 服务已释放时：注册返回 `ServiceReleased`，查询返回空，分发返回 `DispatchError::ServiceReleased`；
/// - **执行逻辑 (How)**：每次调用时升级弱引用，读取当前快照或以 `rcu` 发布新快照。
#[derive(Clone)]
pub struct Scope {
    base: Pattern,
    kind: ScopeKind,
    guard: Option<Pattern>,
    service: Weak<ServiceInner>,
}

impl Scope {
    /// 受守卫的类型以 `base` 作为守卫模式。
    pub(crate) fn new(base: Pattern, kind: ScopeKind, service: Weak<ServiceInner>) -> Self {
        let guard = kind.is_guarded().then(|| base.clone());
        Self {
            base,
            kind,
            guard,
            service,
        }
    }

    /// 作用域的基础模式。
    pub fn pattern(&self) -> &Pattern {
        &self.base
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// 递归守卫模式；根与服务端作用域没有守卫，子作用域沿用父作用域的守卫。
    pub fn guard(&self) -> Option<&Pattern> {
        self.guard.as_ref()
    }

    /// 服务注入的日志器；服务已释放时返回丢弃一切的日志器。
    pub fn logger(&self) -> Arc<dyn Logger> {
        match self.service.upgrade() {
            Some(inner) => inner.shared_logger(),
            None => Arc::new(NoopLogger),
        }
    }

    fn scoped(&self, pattern: &Pattern) -> Pattern {
        pattern.merge(&self.base)
    }

    fn child(&self, base: Pattern, kind: ScopeKind) -> Scope {
        Scope::new(base, kind, self.service.clone())
    }

    fn upgrade_for(&self, pattern: &Pattern) -> Result<Arc<ServiceInner>, RegistrationError> {
        self.service
            .upgrade()
            .ok_or_else(|| RegistrationError::ServiceReleased {
                pattern: pattern.display_name(),
            })
    }

    fn log_registration(&self, inner: &ServiceInner, message: &str, pattern: &Pattern, outcome: &str) {
        let name = pattern.display_name();
        inner.logger().info(
            message,
            &[
                KeyValue::new(FIELD_PATTERN, name.as_str()),
                KeyValue::new(FIELD_SCOPE_KIND, self.kind.as_str()),
                KeyValue::new(FIELD_OUTCOME, outcome),
            ],
        );
    }

    /// 在合并后的模式下注册本地方法。
    pub fn add(&self, pattern: Pattern, handler: BoxHandler) -> Result<&Self, RegistrationError> {
        let pattern = self.scoped(&pattern);
        let inner = self.upgrade_for(&pattern)?;
        inner.publish(|snapshot| snapshot.with_method(pattern.clone(), Arc::clone(&handler)));
        self.log_registration(&inner, "method added", &pattern, "registered");
        Ok(self)
    }

    /// 注册请求中间件（对应 `use`）。
    ///
    /// 工厂收到绑定在合并模式上的 `Middleware` 作用域；返回 `Ok(None)` 表示放弃注册，
    /// 返回 `Err` 会中止本次注册并以 [`RegistrationError::Factory`] 传给调用方。
    pub fn use_middleware<F>(&self, pattern: Pattern, factory: F) -> Result<&Self, RegistrationError>
    where
        F: FnOnce(Scope) -> Result<Option<BoxMiddleware>, HandlerError>,
    {
        let pattern = self.scoped(&pattern);
        let inner = self.upgrade_for(&pattern)?;
        let scope = self.child(pattern.clone(), ScopeKind::Middleware);
        match factory(scope).map_err(|source| factory_error(&pattern, source))? {
            Some(middleware) => {
                inner.publish(|snapshot| {
                    snapshot.with_middleware(pattern.clone(), Arc::clone(&middleware))
                });
                self.log_registration(&inner, "middleware used", &pattern, "registered");
            }
            None => self.log_registration(&inner, "middleware used", &pattern, "declined"),
        }
        Ok(self)
    }

    /// 注册客户端，契约与 [`Scope::use_middleware`] 相同，但写入客户端表。
    pub fn attach<F>(&self, pattern: Pattern, factory: F) -> Result<&Self, RegistrationError>
    where
        F: FnOnce(Scope) -> Result<Option<BoxHandler>, HandlerError>,
    {
        let pattern = self.scoped(&pattern);
        let inner = self.upgrade_for(&pattern)?;
        let scope = self.child(pattern.clone(), ScopeKind::Client);
        match factory(scope).map_err(|source| factory_error(&pattern, source))? {
            Some(client) => {
                inner.publish(|snapshot| snapshot.with_client(pattern.clone(), Arc::clone(&client)));
                self.log_registration(&inner, "client attached", &pattern, "registered");
            }
            None => self.log_registration(&inner, "client attached", &pattern, "declined"),
        }
        Ok(self)
    }

    /// 立即以 `Server` 作用域调用服务端工厂，交由传输适配器自行接线；不写入任何路由表。
    pub fn expose<F>(&self, pattern: Pattern, factory: F) -> Result<&Self, RegistrationError>
    where
        F: FnOnce(Scope) -> Result<(), HandlerError>,
    {
        let pattern = self.scoped(&pattern);
        let inner = self.upgrade_for(&pattern)?;
        let scope = self.child(pattern.clone(), ScopeKind::Server);
        factory(scope).map_err(|source| factory_error(&pattern, source))?;
        self.log_registration(&inner, "server exposed", &pattern, "registered");
        Ok(self)
    }

    /// 删除与合并模式结构相等的全部方法。
    pub fn remove(&self, pattern: &Pattern) -> Result<&Self, RegistrationError> {
        let pattern = self.scoped(pattern);
        let inner = self.upgrade_for(&pattern)?;
        let previous = inner.publish(|snapshot| snapshot.without_methods(&pattern));
        let removed = previous
            .methods()
            .iter()
            .filter(|entry| entry.pattern == pattern)
            .count();

        let name = pattern.display_name();
        inner.logger().info(
            "method removed",
            &[
                KeyValue::new(FIELD_PATTERN, name.as_str()),
                KeyValue::new(FIELD_SCOPE_KIND, self.kind.as_str()),
                KeyValue::new(FIELD_REMOVED, removed),
            ],
        );
        Ok(self)
    }

    /// 按合并模式查找最佳匹配方法。
    pub fn find(&self, pattern: &Pattern) -> Option<Entry<BoxHandler>> {
        let inner = self.service.upgrade()?;
        inner.load().methods().find(&self.scoped(pattern)).cloned()
    }

    pub fn has(&self, pattern: &Pattern) -> bool {
        self.find(pattern).is_some()
    }

    /// 按合并模式列出全部匹配方法，保持注册顺序。
    pub fn list(&self, pattern: &Pattern) -> Vec<Entry<BoxHandler>> {
        let Some(inner) = self.service.upgrade() else {
            return Vec::new();
        };
        inner
            .load()
            .methods()
            .list(&self.scoped(pattern))
            .into_iter()
            .cloned()
            .collect()
    }

    /// 更窄的子作用域：基础模式为两者合并，类型与守卫不变。
    pub fn scope(&self, pattern: &Pattern) -> Scope {
        Scope {
            base: self.scoped(pattern),
            kind: self.kind,
            guard: self.guard.clone(),
            service: self.service.clone(),
        }
    }

    /// 受守卫的分发入口。
    ///
    /// - 根/服务端作用域：把基础模式覆盖进消息后交给引擎；
    /// - 中间件/客户端作用域（及其子作用域）：消息若会再次命中守卫模式则拒绝，返回 `Ok(None)`。
    pub async fn dispatch(&self, message: Message) -> Result<Option<Value>, DispatchError> {
        let inner = self.service.upgrade().ok_or(DispatchError::ServiceReleased)?;

        let Some(guard) = &self.guard else {
            let message = self.base.overlay_onto(&message);
            return engine::dispatch(&inner, message).await;
        };

        let test = Pattern::from_message(&message);
        if inner.load().matcher().matches(guard, &test) {
            let name = guard.display_name();
            inner.logger().warn(
                "recursive dispatch rejected",
                &[
                    KeyValue::new(FIELD_PATTERN, name.as_str()),
                    KeyValue::new(FIELD_SCOPE_KIND, self.kind.as_str()),
                ],
            );
            return Ok(None);
        }

        engine::dispatch(&inner, message).await
    }

    /// [`Scope::dispatch`] 的别名。
    pub async fn exec(&self, message: Message) -> Result<Option<Value>, DispatchError> {
        self.dispatch(message).await
    }

    /// 绕过递归守卫，直接交给根引擎；消息原样传递。
    pub async fn force_dispatch(&self, message: Message) -> Result<Option<Value>, DispatchError> {
        let inner = self.service.upgrade().ok_or(DispatchError::ServiceReleased)?;
        engine::dispatch(&inner, message).await
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("pattern", &self.base)
            .field("kind", &self.kind)
            .field("guard", &self.guard)
            .field("released", &(self.service.strong_count() == 0))
            .finish()
    }
}

fn factory_error(pattern: &Pattern, source: HandlerError) -> RegistrationError {
    RegistrationError::Factory {
        pattern: pattern.display_name(),
        source,
    }
}
