//! # engine 模块说明
//!
//! ## 角色定位（Why）
//! - 驱动一次分发的完整管线：匹配 → 请求中间件 → 客户端选择 → 响应函数回放；
//! - 单次分发内部严格顺序执行，后一个中间件依赖前一个的改写结果，客户端选择依赖候选顺序。
//!
//! ## 阶段契约（What）
//! - **Matching**：以整条消息构造反向测试模式，对中间件表与客户端表分别 `list`，
//!   命中的条目都是候选，可能为零个、一个或多个；
//! - **RequestMiddleware**：按注册顺序调用，消息逐个传递；失败即中止整个分发；
//! - **ClientSelection**：按注册顺序尝试客户端，每个客户端最多尝试 [`RetryPolicy`](crate::RetryPolicy)
//!   规定的次数；首个非空成功结果胜出，全部失败时没有结果且不视为错误；
//! - **ResponseMiddleware**：仅在有结果时按中间件匹配顺序回放响应函数；单个响应函数失败只记录日志，
//!   保留此前的结果继续回放；
//! - 分发开始前加载一次快照，整个过程只看这一份快照。

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{DispatchError, HandlerError};
use crate::handler::{BoxHandler, BoxMiddleware, BoxResponseHook};
use crate::observability::keys::{
    FIELD_ATTEMPT, FIELD_HAS_RESULT, FIELD_MATCHED, FIELD_MAX_ATTEMPTS, FIELD_MESSAGE,
    FIELD_PATTERN, FIELD_PHASE, FIELD_POSITION, FIELD_QUEUED, FIELD_REQUEST_ID, FIELD_RESULT,
};
use crate::observability::{KeyValue, LogLevel, Logger};
use crate::pattern::{Message, Pattern};
use crate::service::{ServiceInner, ServiceSnapshot};

/// 分发阶段，用于日志字段。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchPhase {
    Matching,
    RequestMiddleware,
    ClientSelection,
    ResponseMiddleware,
    Completed,
    Failed,
}

impl DispatchPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Matching => "matching",
            Self::RequestMiddleware => "request_middleware",
            Self::ClientSelection => "client_selection",
            Self::ResponseMiddleware => "response_middleware",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 以服务当前快照执行一次分发。
pub(crate) async fn dispatch(
    inner: &ServiceInner,
    message: Message,
) -> Result<Option<Value>, DispatchError> {
    let run = DispatchRun {
        inner,
        snapshot: inner.load(),
        request_id: inner.next_request_id(),
    };
    run.execute(message).await
}

/// 一次分发的上下文：固定的快照与请求序号。
struct DispatchRun<'a> {
    inner: &'a ServiceInner,
    snapshot: Arc<ServiceSnapshot>,
    request_id: u64,
}

/// 匹配阶段选出的候选条目。
struct Candidates {
    middleware: Vec<(Pattern, BoxMiddleware)>,
    clients: Vec<(Pattern, BoxHandler)>,
}

impl DispatchRun<'_> {
    fn logger(&self) -> &dyn Logger {
        self.inner.logger()
    }

    async fn execute(&self, message: Message) -> Result<Option<Value>, DispatchError> {
        self.logger().info(
            "dispatch started",
            &[
                KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                KeyValue::new(FIELD_PHASE, DispatchPhase::Matching.as_str()),
            ],
        );
        self.debug_payload("dispatch message", FIELD_MESSAGE, &message);

        let candidates = self.match_candidates(&message);

        let (message, responses) = match self.run_request_middleware(&candidates, message).await {
            Ok(threaded) => threaded,
            Err(error) => {
                self.logger().info(
                    "dispatch failed",
                    &[
                        KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                        KeyValue::new(FIELD_PHASE, DispatchPhase::Failed.as_str()),
                    ],
                );
                return Err(error);
            }
        };

        let result = self.select_client(&candidates, message).await;

        let result = match result {
            Some(value) => Some(self.run_response_hooks(responses, value).await),
            None => {
                self.logger().silly(
                    "response phase skipped",
                    &[
                        KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                        KeyValue::new(FIELD_PHASE, DispatchPhase::ResponseMiddleware.as_str()),
                        KeyValue::new(FIELD_QUEUED, responses.len()),
                    ],
                );
                None
            }
        };

        self.logger().info(
            "dispatch completed",
            &[
                KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                KeyValue::new(FIELD_PHASE, DispatchPhase::Completed.as_str()),
                KeyValue::new(FIELD_HAS_RESULT, result.is_some()),
            ],
        );
        if let Some(value) = &result {
            self.debug_payload("dispatch result", FIELD_RESULT, value);
        }
        Ok(result)
    }

    fn match_candidates(&self, message: &Message) -> Candidates {
        let test = Pattern::from_message(message);

        let middleware: Vec<_> = self
            .snapshot
            .middleware()
            .list(&test)
            .into_iter()
            .map(|entry| (entry.pattern.clone(), Arc::clone(&entry.handler)))
            .collect();
        let clients: Vec<_> = self
            .snapshot
            .clients()
            .list(&test)
            .into_iter()
            .map(|entry| (entry.pattern.clone(), Arc::clone(&entry.handler)))
            .collect();

        for (phase, matched) in [
            (DispatchPhase::RequestMiddleware, middleware.len()),
            (DispatchPhase::ClientSelection, clients.len()),
        ] {
            self.logger().silly(
                "phase matched",
                &[
                    KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                    KeyValue::new(FIELD_PHASE, phase.as_str()),
                    KeyValue::new(FIELD_MATCHED, matched),
                ],
            );
        }

        Candidates {
            middleware,
            clients,
        }
    }

    async fn run_request_middleware(
        &self,
        candidates: &Candidates,
        mut message: Message,
    ) -> Result<(Message, Vec<BoxResponseHook>), DispatchError> {
        let mut responses = Vec::new();

        for (index, (pattern, middleware)) in candidates.middleware.iter().enumerate() {
            match middleware.on_request(message).await {
                Ok(outcome) => {
                    message = outcome.message;
                    if let Some(hook) = outcome.response {
                        responses.push(hook);
                    }
                }
                Err(source) => {
                    let name = pattern.display_name();
                    self.logger().error(
                        "request middleware failed",
                        Some(as_cause(&source)),
                        &[
                            KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                            KeyValue::new(FIELD_PATTERN, name.as_str()),
                            KeyValue::new(FIELD_POSITION, index),
                        ],
                    );
                    return Err(DispatchError::RequestMiddleware {
                        index,
                        pattern: name,
                        source,
                    });
                }
            }
        }

        Ok((message, responses))
    }

    async fn select_client(&self, candidates: &Candidates, message: Message) -> Option<Value> {
        let retry = self.inner.retry();
        let max_attempts = retry.max_attempts().get();

        for (position, (pattern, client)) in candidates.clients.iter().enumerate() {
            let name = pattern.display_name();
            let outcome = retry
                .run(
                    |_attempt| client.call(message.clone()),
                    |attempt, error: &HandlerError| {
                        self.logger().silly(
                            &format!("client attempt failed: {error:#}"),
                            &[
                                KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                                KeyValue::new(FIELD_PATTERN, name.as_str()),
                                KeyValue::new(FIELD_ATTEMPT, attempt),
                                KeyValue::new(FIELD_MAX_ATTEMPTS, max_attempts),
                            ],
                        );
                    },
                )
                .await;

            match outcome {
                Ok(Value::Null) => {
                    self.logger().silly(
                        "client returned no result",
                        &[
                            KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                            KeyValue::new(FIELD_PATTERN, name.as_str()),
                            KeyValue::new(FIELD_POSITION, position),
                        ],
                    );
                }
                Ok(value) => return Some(value),
                Err(error) => {
                    self.logger().error(
                        "client exhausted retries",
                        Some(as_cause(&error)),
                        &[
                            KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                            KeyValue::new(FIELD_PATTERN, name.as_str()),
                            KeyValue::new(FIELD_POSITION, position),
                            KeyValue::new(FIELD_MAX_ATTEMPTS, max_attempts),
                        ],
                    );
                }
            }
        }

        None
    }

    async fn run_response_hooks(&self, responses: Vec<BoxResponseHook>, mut value: Value) -> Value {
        for (position, hook) in responses.into_iter().enumerate() {
            let previous = value.clone();
            value = match hook.on_response(value).await {
                Ok(next) => next,
                Err(error) => {
                    self.logger().error(
                        "response middleware failed",
                        Some(as_cause(&error)),
                        &[
                            KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                            KeyValue::new(FIELD_PHASE, DispatchPhase::ResponseMiddleware.as_str()),
                            KeyValue::new(FIELD_POSITION, position),
                        ],
                    );
                    previous
                }
            };
        }
        value
    }

    fn debug_payload<T: Serialize>(&self, message: &str, key: &'static str, payload: &T) {
        if !self.logger().enabled(LogLevel::Debug) {
            return;
        }
        let rendered = serde_json::to_string(payload).unwrap_or_default();
        self.logger().debug(
            message,
            &[
                KeyValue::new(FIELD_REQUEST_ID, self.request_id),
                KeyValue::new(key, rendered),
            ],
        );
    }
}

fn as_cause(error: &HandlerError) -> &(dyn Error + 'static) {
    error.as_ref()
}
