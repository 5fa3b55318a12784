//! # handler 模块说明
//!
//! ## 角色定位（Why）
//! - 定义分发核心调用的三种可执行单元：方法/客户端处理器、请求中间件与响应函数；
//! - 所有契约都以 `BoxFuture<'static, _>` 返回，调用方可在任意执行器上驱动。
//!
//! ## 设计要求（What）
//! - 处理器与请求中间件以 `Arc<dyn _>` 形式存入路由表，快照之间共享；
//! - 响应函数一次性消费（`Box<dyn ResponseHook>`），由请求中间件在每次分发时按需产生；
//! - 失败统一为 [`HandlerError`]。
//!
//! ## 使用指引（How）
//! - 闭包可通过 [`handler_fn`]、[`middleware_fn`]、[`response_fn`] 直接适配；
//! - 需要内部状态的实现可直接为自定义类型实现对应 trait。

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::HandlerError;
use crate::pattern::Message;

/// 方法与客户端处理器：接收消息，异步产出结果值。
///
/// # 契约说明（What）
/// - 作为客户端使用时，返回 `Ok(Value::Null)` 表示“没有结果”，引擎会继续尝试下一个客户端；
/// - 返回 `Err` 时引擎按 [`RetryPolicy`](crate::RetryPolicy) 重试同一客户端。
pub trait Handler: Send + Sync + 'static {
    fn call(&self, message: Message) -> BoxFuture<'static, Result<Value, HandlerError>>;
}

/// 共享的处理器句柄。
pub type BoxHandler = Arc<dyn Handler>;

/// 请求阶段中间件。
///
/// # 教案式说明
/// - **意图 (Why)**：在客户端调用之前改写消息，并可选地登记一个在结果返回后执行的响应函数；
/// - **契约 (What)**：
///   - 输入为上一个中间件处理后的消息（按值传递）；
///   - 输出 [`RequestOutcome`]，其中的 `message` 传给下一个中间件，`response` 进入回放队列；
///   - 返回 `Err` 会中止整个分发，不做重试。
pub trait RequestMiddleware: Send + Sync + 'static {
    fn on_request(&self, message: Message)
    -> BoxFuture<'static, Result<RequestOutcome, HandlerError>>;
}

/// 共享的请求中间件句柄。
pub type BoxMiddleware = Arc<dyn RequestMiddleware>;

/// 响应函数：一次性消费，按登记顺序对结果做变换或观察。
///
/// 返回值替换当前结果；只做观察的实现原样返回输入即可。
pub trait ResponseHook: Send + 'static {
    fn on_response(self: Box<Self>, result: Value)
    -> BoxFuture<'static, Result<Value, HandlerError>>;
}

/// 排队中的响应函数。
pub type BoxResponseHook = Box<dyn ResponseHook>;

/// 请求中间件的产出。
pub struct RequestOutcome {
    pub message: Message,
    pub response: Option<BoxResponseHook>,
}

impl RequestOutcome {
    /// 继续传递消息，不登记响应函数。
    pub fn forward(message: Message) -> Self {
        Self {
            message,
            response: None,
        }
    }

    /// 登记响应函数。
    pub fn with_response(mut self, hook: BoxResponseHook) -> Self {
        self.response = Some(hook);
        self
    }
}

impl fmt::Debug for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOutcome")
            .field("message", &self.message)
            .field("has_response", &self.response.is_some())
            .finish()
    }
}

/// 闭包到 [`Handler`] 的桥接。
pub struct HandlerFn<F>(F);

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    fn call(&self, message: Message) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin((self.0)(message))
    }
}

/// 将闭包适配为共享处理器。
///
/// ```
/// use patmos_core::{Handler, handler_fn, message};
/// use serde_json::json;
///
/// let users = handler_fn(|_message| async { Ok(json!({ "msg": "GET users" })) });
/// let result = futures::executor::block_on(users.call(message! { "method" => "GET" })).unwrap();
/// assert_eq!(result, json!({ "msg": "GET users" }));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> BoxHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Arc::new(HandlerFn(f))
}

/// 闭包到 [`RequestMiddleware`] 的桥接。
pub struct MiddlewareFn<F>(F);

impl<F, Fut> RequestMiddleware for MiddlewareFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RequestOutcome, HandlerError>> + Send + 'static,
{
    fn on_request(
        &self,
        message: Message,
    ) -> BoxFuture<'static, Result<RequestOutcome, HandlerError>> {
        Box::pin((self.0)(message))
    }
}

/// 将闭包适配为共享请求中间件。
pub fn middleware_fn<F, Fut>(f: F) -> BoxMiddleware
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RequestOutcome, HandlerError>> + Send + 'static,
{
    Arc::new(MiddlewareFn(f))
}

/// 闭包到 [`ResponseHook`] 的桥接。
pub struct ResponseFn<F>(F);

impl<F, Fut> ResponseHook for ResponseFn<F>
where
    F: FnOnce(Value) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    fn on_response(
        self: Box<Self>,
        result: Value,
    ) -> BoxFuture<'static, Result<Value, HandlerError>> {
        Box::pin((self.0)(result))
    }
}

/// 将一次性闭包适配为响应函数。
pub fn response_fn<F, Fut>(f: F) -> BoxResponseHook
where
    F: FnOnce(Value) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Box::new(ResponseFn(f))
}
