//! # plan 模块说明
//!
//! ## 角色定位（Why）
//! - 让宿主以声明式的方式批量注册：每项注册只写明“哪个模块的哪个导出、带什么参数”；
//! - 名字到具体处理器的解析由宿主注入的 [`HandlerResolver`] 完成，核心不做任何动态加载。
//!
//! ## 设计要求（What）
//! - [`RegistrationPlan::apply`] 的顺序固定为：客户端 → 方法 → 中间件 → 服务端 → 子作用域（递归）；
//! - 任一解析或注册失败立即中止并返回 [`RegistrationError`]，此前已完成的注册保持生效；
//! - 计划本身不规定任何文件格式，由宿主从自己的配置源构造。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{HandlerError, RegistrationError};
use crate::handler::{BoxHandler, BoxMiddleware};
use crate::pattern::Pattern;
use crate::scope::Scope;

/// 缺省导出名。
pub const DEFAULT_EXPORT: &str = "default";

/// 对一个处理器的抽象引用。
#[derive(Clone, Debug, PartialEq)]
pub struct HandlerSpec {
    pub module: String,
    pub export: String,
    pub args: Value,
}

impl HandlerSpec {
    /// 引用模块的缺省导出。
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            export: DEFAULT_EXPORT.to_owned(),
            args: Value::Null,
        }
    }

    pub fn export(mut self, export: impl Into<String>) -> Self {
        self.export = export.into();
        self
    }

    pub fn args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    fn unresolved(&self) -> RegistrationError {
        RegistrationError::Unresolved {
            module: self.module.clone(),
            export: self.export.clone(),
        }
    }
}

/// 中间件工厂：收到中间件作用域，返回请求中间件或放弃注册。
pub type MiddlewareFactory =
    Box<dyn FnOnce(Scope) -> Result<Option<BoxMiddleware>, HandlerError> + Send>;
/// 客户端工厂。
pub type ClientFactory = Box<dyn FnOnce(Scope) -> Result<Option<BoxHandler>, HandlerError> + Send>;
/// 服务端工厂：收到服务端作用域，自行完成传输接线。
pub type ServerFactory = Box<dyn FnOnce(Scope) -> Result<(), HandlerError> + Send>;

/// 把 [`HandlerSpec`] 解析为具体处理器或工厂的能力。
///
/// # 契约说明（What）
/// - 找不到模块或导出时返回 [`RegistrationError::Unresolved`]；
/// - 解析只在注册期发生，分发期不会再调用解析器。
pub trait HandlerResolver {
    fn resolve_method(&self, spec: &HandlerSpec) -> Result<BoxHandler, RegistrationError>;

    fn resolve_middleware(&self, spec: &HandlerSpec) -> Result<MiddlewareFactory, RegistrationError>;

    fn resolve_client(&self, spec: &HandlerSpec) -> Result<ClientFactory, RegistrationError>;

    fn resolve_server(&self, spec: &HandlerSpec) -> Result<ServerFactory, RegistrationError>;
}

/// 声明式注册计划。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistrationPlan {
    pub clients: Vec<(Pattern, HandlerSpec)>,
    pub methods: Vec<(Pattern, HandlerSpec)>,
    pub middleware: Vec<(Pattern, HandlerSpec)>,
    pub servers: Vec<(Pattern, HandlerSpec)>,
    pub scopes: Vec<(Pattern, RegistrationPlan)>,
}

impl RegistrationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(mut self, pattern: Pattern, spec: HandlerSpec) -> Self {
        self.clients.push((pattern, spec));
        self
    }

    pub fn method(mut self, pattern: Pattern, spec: HandlerSpec) -> Self {
        self.methods.push((pattern, spec));
        self
    }

    pub fn middleware(mut self, pattern: Pattern, spec: HandlerSpec) -> Self {
        self.middleware.push((pattern, spec));
        self
    }

    pub fn server(mut self, pattern: Pattern, spec: HandlerSpec) -> Self {
        self.servers.push((pattern, spec));
        self
    }

    pub fn scope(mut self, pattern: Pattern, plan: RegistrationPlan) -> Self {
        self.scopes.push((pattern, plan));
        self
    }

    /// 在 `scope` 上按固定顺序应用计划。
    ///
    /// - 服务端排在客户端、方法与中间件之后接线，子计划最后在 `scope.scope(pattern)` 上递归应用；
    /// - 首个错误立即返回，不回滚已完成的注册。
    pub fn apply(&self, scope: &Scope, resolver: &dyn HandlerResolver) -> Result<(), RegistrationError> {
        for (pattern, spec) in &self.clients {
            let factory = resolver.resolve_client(spec)?;
            scope.attach(pattern.clone(), factory)?;
        }
        for (pattern, spec) in &self.methods {
            let handler = resolver.resolve_method(spec)?;
            scope.add(pattern.clone(), handler)?;
        }
        for (pattern, spec) in &self.middleware {
            let factory = resolver.resolve_middleware(spec)?;
            scope.use_middleware(pattern.clone(), factory)?;
        }
        for (pattern, spec) in &self.servers {
            let factory = resolver.resolve_server(spec)?;
            scope.expose(pattern.clone(), factory)?;
        }
        for (pattern, plan) in &self.scopes {
            plan.apply(&scope.scope(pattern), resolver)?;
        }
        Ok(())
    }
}

type MethodBuilder = Arc<dyn Fn(&Value) -> Result<BoxHandler, HandlerError> + Send + Sync>;
type MiddlewareBuilder =
    Arc<dyn Fn(&Value, Scope) -> Result<Option<BoxMiddleware>, HandlerError> + Send + Sync>;
type ClientBuilder =
    Arc<dyn Fn(&Value, Scope) -> Result<Option<BoxHandler>, HandlerError> + Send + Sync>;
type ServerBuilder = Arc<dyn Fn(&Value, Scope) -> Result<(), HandlerError> + Send + Sync>;

#[derive(Clone)]
enum Export {
    Method(MethodBuilder),
    Middleware(MiddlewareBuilder),
    Client(ClientBuilder),
    Server(ServerBuilder),
}

/// 内存中的模块表，按 `(module, export)` 登记可被计划引用的导出。
///
/// 每个导出都是“参数 → 处理器/工厂”的构造函数，`HandlerSpec::args` 在解析时传入。
/// 导出存在但种类不符（例如把客户端导出当作方法引用）同样视为无法解析。
#[derive(Clone, Default)]
pub struct ModuleTable {
    exports: HashMap<(String, String), Export>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<F>(mut self, module: &str, export: &str, build: F) -> Self
    where
        F: Fn(&Value) -> Result<BoxHandler, HandlerError> + Send + Sync + 'static,
    {
        self.insert(module, export, Export::Method(Arc::new(build)));
        self
    }

    pub fn middleware<F>(mut self, module: &str, export: &str, build: F) -> Self
    where
        F: Fn(&Value, Scope) -> Result<Option<BoxMiddleware>, HandlerError> + Send + Sync + 'static,
    {
        self.insert(module, export, Export::Middleware(Arc::new(build)));
        self
    }

    pub fn client<F>(mut self, module: &str, export: &str, build: F) -> Self
    where
        F: Fn(&Value, Scope) -> Result<Option<BoxHandler>, HandlerError> + Send + Sync + 'static,
    {
        self.insert(module, export, Export::Client(Arc::new(build)));
        self
    }

    pub fn server<F>(mut self, module: &str, export: &str, build: F) -> Self
    where
        F: Fn(&Value, Scope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.insert(module, export, Export::Server(Arc::new(build)));
        self
    }

    fn insert(&mut self, module: &str, export: &str, entry: Export) {
        self.exports
            .insert((module.to_owned(), export.to_owned()), entry);
    }

    fn lookup(&self, spec: &HandlerSpec) -> Option<&Export> {
        self.exports
            .get(&(spec.module.clone(), spec.export.clone()))
    }
}

impl HandlerResolver for ModuleTable {
    fn resolve_method(&self, spec: &HandlerSpec) -> Result<BoxHandler, RegistrationError> {
        match self.lookup(spec) {
            Some(Export::Method(build)) => build(&spec.args).map_err(|source| {
                RegistrationError::Factory {
                    pattern: format!("{}#{}", spec.module, spec.export),
                    source,
                }
            }),
            _ => Err(spec.unresolved()),
        }
    }

    fn resolve_middleware(&self, spec: &HandlerSpec) -> Result<MiddlewareFactory, RegistrationError> {
        match self.lookup(spec) {
            Some(Export::Middleware(build)) => {
                let build = Arc::clone(build);
                let args = spec.args.clone();
                Ok(Box::new(move |scope| build(&args, scope)))
            }
            _ => Err(spec.unresolved()),
        }
    }

    fn resolve_client(&self, spec: &HandlerSpec) -> Result<ClientFactory, RegistrationError> {
        match self.lookup(spec) {
            Some(Export::Client(build)) => {
                let build = Arc::clone(build);
                let args = spec.args.clone();
                Ok(Box::new(move |scope| build(&args, scope)))
            }
            _ => Err(spec.unresolved()),
        }
    }

    fn resolve_server(&self, spec: &HandlerSpec) -> Result<ServerFactory, RegistrationError> {
        match self.lookup(spec) {
            Some(Export::Server(build)) => {
                let build = Arc::clone(build);
                let args = spec.args.clone();
                Ok(Box::new(move |scope| build(&args, scope)))
            }
            _ => Err(spec.unresolved()),
        }
    }
}

impl fmt::Debug for ModuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self
            .exports
            .keys()
            .map(|(module, export)| format!("{module}#{export}"))
            .collect();
        names.sort();
        f.debug_struct("ModuleTable").field("exports", &names).finish()
    }
}
