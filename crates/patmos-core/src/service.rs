//! # service 模块说明
//!
//! ## 角色定位（Why）
//! - [`Service`] 是分发核心的公开入口，持有当前 [`ServiceSnapshot`] 与注入的日志、重试能力；
//! - 注册调用不修改现有快照，而是构造新快照并整体替换引用。
//!
//! ## 并发模型（How）
//! - 快照存放在 `ArcSwap` 中：读路径（分发、查询）无锁加载，写路径（注册）以 `rcu` 整表替换；
//! - 正在进行的分发持有旧快照的 `Arc`，直到完成都看不到后续注册；
//! - 并发注册之间由 `rcu` 的比较交换重试保证不丢失更新。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::config::DispatchConfig;
use crate::error::{DispatchError, HandlerError, RegistrationError};
use crate::handler::{BoxHandler, BoxMiddleware};
use crate::matcher::Matcher;
use crate::observability::{LevelFilter, Logger, TracingLogger};
use crate::pattern::{Message, Pattern};
use crate::retry::RetryPolicy;
use crate::scope::{Scope, ScopeKind};
use crate::store::{Entry, PatternStore};

/// 不可变的服务快照：方法表、中间件表、客户端表与配置。
///
/// # 契约说明（What）
/// - 三张表都是 [`PatternStore`]，条目按注册顺序保存；
/// - 快照一经发布不再修改，`with_*`/`without_*` 都返回新值并与旧值共享未改动部分。
#[derive(Clone)]
pub struct ServiceSnapshot {
    methods: PatternStore<BoxHandler>,
    middleware: PatternStore<BoxMiddleware>,
    clients: PatternStore<BoxHandler>,
    config: DispatchConfig,
}

impl ServiceSnapshot {
    pub fn new(config: DispatchConfig) -> Self {
        let matcher = config.matcher();
        Self {
            methods: PatternStore::new(matcher),
            middleware: PatternStore::new(matcher),
            clients: PatternStore::new(matcher),
            config,
        }
    }

    pub fn methods(&self) -> &PatternStore<BoxHandler> {
        &self.methods
    }

    pub fn middleware(&self) -> &PatternStore<BoxMiddleware> {
        &self.middleware
    }

    pub fn clients(&self) -> &PatternStore<BoxHandler> {
        &self.clients
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn matcher(&self) -> Matcher {
        self.config.matcher()
    }

    #[must_use]
    pub fn with_method(&self, pattern: Pattern, handler: BoxHandler) -> Self {
        Self {
            methods: self.methods.add(pattern, handler),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_middleware(&self, pattern: Pattern, middleware: BoxMiddleware) -> Self {
        Self {
            middleware: self.middleware.add(pattern, middleware),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_client(&self, pattern: Pattern, client: BoxHandler) -> Self {
        Self {
            clients: self.clients.add(pattern, client),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn without_methods(&self, pattern: &Pattern) -> Self {
        Self {
            methods: self.methods.remove(pattern),
            ..self.clone()
        }
    }
}

impl fmt::Debug for ServiceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSnapshot")
            .field("methods", &self.methods.len())
            .field("middleware", &self.middleware.len())
            .field("clients", &self.clients.len())
            .field("config", &self.config)
            .finish()
    }
}

/// 服务的共享内部状态，由作用域以弱引用持有。
pub(crate) struct ServiceInner {
    snapshot: ArcSwap<ServiceSnapshot>,
    logger: Arc<dyn Logger>,
    retry: RetryPolicy,
    next_request_id: AtomicU64,
}

impl ServiceInner {
    pub(crate) fn load(&self) -> Arc<ServiceSnapshot> {
        self.snapshot.load_full()
    }

    /// 以 `update` 计算新快照并原子替换当前快照，返回被替换的旧快照。
    pub(crate) fn publish<F>(&self, update: F) -> Arc<ServiceSnapshot>
    where
        F: Fn(&ServiceSnapshot) -> ServiceSnapshot,
    {
        self.snapshot.rcu(|current| update(current))
    }

    pub(crate) fn logger(&self) -> &dyn Logger {
        &*self.logger
    }

    pub(crate) fn shared_logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.logger)
    }

    pub(crate) fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub(crate) fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// [`Service`] 的构造器。
///
/// 缺省日志器为 [`TracingLogger`]，缺省重试策略为三次尝试；
/// 无论注入何种日志器，都会按 `config.log.level` 包一层 [`LevelFilter`]。
pub struct ServiceBuilder {
    config: DispatchConfig,
    logger: Option<Arc<dyn Logger>>,
    retry: RetryPolicy,
}

impl ServiceBuilder {
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Service {
        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingLogger::new()));
        let filtered: Arc<dyn Logger> = Arc::new(LevelFilter::new(logger, self.config.log.level));
        Service {
            inner: Arc::new(ServiceInner {
                snapshot: ArcSwap::from_pointee(ServiceSnapshot::new(self.config)),
                logger: filtered,
                retry: self.retry,
                next_request_id: AtomicU64::new(1),
            }),
        }
    }
}

/// 模式路由的消息分发服务。
///
/// # 教案式说明
/// - **意图 (Why)**：对外暴露注册（`add`/`use_middleware`/`attach`/`expose`/`remove`）、
///   查询（`find`/`has`/`list`）、分层（`scope`）与分发（`dispatch`/`exec`）接口；
/// - **契约 (What)**：
///   - 所有调用都委托给根作用域（基础模式为空、无递归守卫）；
///   - 注册方法返回 `Result<&Self, RegistrationError>`，可用 `?` 链式调用；
///   - `Service` 可廉价克隆，克隆共享同一份内部状态；
/// - **风险 (Trade-offs)**：作用域只持有弱引用，全部 `Service` 句柄释放后，
///   遗留作用域上的注册与分发会返回 `ServiceReleased`。
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

impl Service {
    pub fn new(config: DispatchConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn with_logger(config: DispatchConfig, logger: Arc<dyn Logger>) -> Self {
        Self::builder(config).logger(logger).build()
    }

    pub fn builder(config: DispatchConfig) -> ServiceBuilder {
        ServiceBuilder {
            config,
            logger: None,
            retry: RetryPolicy::default(),
        }
    }

    /// 根作用域：基础模式为空，不设递归守卫。
    pub fn root(&self) -> Scope {
        Scope::new(
            Pattern::new(),
            ScopeKind::Root,
            Arc::downgrade(&self.inner),
        )
    }

    /// 当前快照。返回的 `Arc` 不受后续注册影响。
    pub fn snapshot(&self) -> Arc<ServiceSnapshot> {
        self.inner.load()
    }

    pub fn config(&self) -> DispatchConfig {
        self.inner.load().config().clone()
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        self.inner.shared_logger()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry()
    }

    pub fn add(&self, pattern: Pattern, handler: BoxHandler) -> Result<&Self, RegistrationError> {
        self.root().add(pattern, handler)?;
        Ok(self)
    }

    pub fn use_middleware<F>(&self, pattern: Pattern, factory: F) -> Result<&Self, RegistrationError>
    where
        F: FnOnce(Scope) -> Result<Option<BoxMiddleware>, HandlerError>,
    {
        self.root().use_middleware(pattern, factory)?;
        Ok(self)
    }

    pub fn attach<F>(&self, pattern: Pattern, factory: F) -> Result<&Self, RegistrationError>
    where
        F: FnOnce(Scope) -> Result<Option<BoxHandler>, HandlerError>,
    {
        self.root().attach(pattern, factory)?;
        Ok(self)
    }

    pub fn expose<F>(&self, pattern: Pattern, factory: F) -> Result<&Self, RegistrationError>
    where
        F: FnOnce(Scope) -> Result<(), HandlerError>,
    {
        self.root().expose(pattern, factory)?;
        Ok(self)
    }

    pub fn remove(&self, pattern: &Pattern) -> Result<&Self, RegistrationError> {
        self.root().remove(pattern)?;
        Ok(self)
    }

    pub fn find(&self, pattern: &Pattern) -> Option<Entry<BoxHandler>> {
        self.root().find(pattern)
    }

    pub fn has(&self, pattern: &Pattern) -> bool {
        self.root().has(pattern)
    }

    pub fn list(&self, pattern: &Pattern) -> Vec<Entry<BoxHandler>> {
        self.root().list(pattern)
    }

    pub fn scope(&self, pattern: &Pattern) -> Scope {
        self.root().scope(pattern)
    }

    pub async fn dispatch(&self, message: Message) -> Result<Option<Value>, DispatchError> {
        self.root().dispatch(message).await
    }

    pub async fn exec(&self, message: Message) -> Result<Option<Value>, DispatchError> {
        self.dispatch(message).await
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("snapshot", &*self.inner.load())
            .field("retry", &self.inner.retry)
            .finish()
    }
}
