//! 作用域递归守卫与绕过入口。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::executor::block_on;
use patmos_core::observability::LogLevel;
use patmos_core::{
    Message, RequestOutcome, ScopeKind, handler_fn, message, middleware_fn, pattern,
};
use serde_json::{Value, json};

use super::support::recorded_service;

type Observed = (Option<Value>, Option<Value>);

#[test]
fn middleware_cannot_reenter_its_own_pattern_without_bypass() {
    let (service, logger) = recorded_service();
    let observed: Arc<Mutex<Vec<Observed>>> = Arc::default();

    service
        .attach(pattern! { "role" => "mw", "cmd" => "timestamp" }, |_| {
            Ok(Some(handler_fn(|_| async { Ok(json!(1_700_000_000_u64)) })))
        })
        .unwrap();

    let recorded = observed.clone();
    service
        .use_middleware(pattern! { "role" => "mw", "cmd" => "timestamp" }, move |scope| {
            assert_eq!(scope.kind(), ScopeKind::Middleware);
            Ok(Some(middleware_fn(move |message: Message| {
                let scope = scope.clone();
                let recorded = recorded.clone();
                async move {
                    if !message.contains_key("extra") {
                        let reentry = message! { "role" => "mw", "cmd" => "timestamp", "extra" => true };
                        let guarded = scope.dispatch(reentry.clone()).await?;
                        let bypassed = scope.force_dispatch(reentry).await?;
                        recorded.lock().unwrap().push((guarded, bypassed));
                    }
                    Ok::<_, anyhow::Error>(RequestOutcome::forward(message))
                }
            })))
        })
        .unwrap();

    let result = block_on(service.dispatch(message! { "role" => "mw", "cmd" => "timestamp" })).unwrap();

    assert_eq!(result, Some(json!(1_700_000_000_u64)));
    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), 1);
    assert_eq!(observed[0].0, None, "受守卫的分发必须被拒绝并返回空结果");
    assert_eq!(observed[0].1, Some(json!(1_700_000_000_u64)), "绕过入口应正常分发");

    let rejected = logger.with_message("recursive dispatch rejected");
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].level, LogLevel::Warn);
    assert_eq!(rejected[0].field("patmos.pattern"), Some("{cmd=timestamp,role=mw}"));
    assert_eq!(rejected[0].field("patmos.scope.kind"), Some("middleware"));
}

#[test]
fn narrowed_middleware_scope_cannot_reenter_its_registration() {
    let (service, logger) = recorded_service();
    let entries = Arc::new(AtomicUsize::new(0));
    let results: Arc<Mutex<Vec<Option<Value>>>> = Arc::default();

    let counted = entries.clone();
    let recorded = results.clone();
    service
        .use_middleware(pattern! { "role" => "mw" }, move |scope| {
            let narrowed = scope.scope(&pattern! { "sub" => 1 });
            Ok(Some(middleware_fn(move |message: Message| {
                let narrowed = narrowed.clone();
                let recorded = recorded.clone();
                let depth = counted.fetch_add(1, Ordering::SeqCst);
                async move {
                    // 守卫失效时这里会无限重入，深度上限只用于让失败的用例终止
                    if depth < 5 {
                        let nested = narrowed.dispatch(message! { "role" => "mw" }).await?;
                        recorded.lock().unwrap().push(nested);
                    }
                    Ok::<_, anyhow::Error>(RequestOutcome::forward(message))
                }
            })))
        })
        .unwrap()
        .attach(pattern! { "role" => "mw" }, |_| {
            Ok(Some(handler_fn(|_| async { Ok(json!("done")) })))
        })
        .unwrap();

    let result = block_on(service.dispatch(message! { "role" => "mw" })).unwrap();

    assert_eq!(result, Some(json!("done")));
    assert_eq!(entries.load(Ordering::SeqCst), 1, "中间件只应被外层分发调用一次");
    assert_eq!(*results.lock().unwrap(), [None]);

    let rejected = logger.with_message("recursive dispatch rejected");
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].level, LogLevel::Warn);
    assert_eq!(rejected[0].field("patmos.pattern"), Some("{role=mw}"));
}

#[test]
fn guarded_scope_may_dispatch_outside_its_pattern() {
    let (service, _) = recorded_service();
    service
        .attach(pattern! { "role" => "clock", "cmd" => "now" }, |_| {
            Ok(Some(handler_fn(|_| async { Ok(json!(42)) })))
        })
        .unwrap()
        .use_middleware(pattern! { "role" => "mw", "cmd" => "timestamp" }, |scope| {
            Ok(Some(middleware_fn(move |mut message: Message| {
                let scope = scope.clone();
                async move {
                    let now = scope
                        .dispatch(message! { "role" => "clock", "cmd" => "now" })
                        .await?
                        .unwrap_or(Value::Null);
                    message.insert("sentAt".into(), now);
                    Ok::<_, anyhow::Error>(RequestOutcome::forward(message))
                }
            })))
        })
        .unwrap()
        .attach(pattern! { "role" => "mw" }, |_| {
            Ok(Some(handler_fn(|message| async move { Ok(Value::Object(message)) })))
        })
        .unwrap();

    let result = block_on(service.dispatch(message! { "role" => "mw", "cmd" => "timestamp" })).unwrap();

    assert_eq!(
        result,
        Some(json!({ "role": "mw", "cmd": "timestamp", "sentAt": 42 }))
    );
}

#[test]
fn client_scope_is_guarded_too() {
    let (service, logger) = recorded_service();
    service
        .attach(pattern! { "service" => "echo" }, |scope| {
            assert_eq!(scope.guard(), Some(&pattern! { "service" => "echo" }));
            Ok(Some(handler_fn(move |message: Message| {
                let scope = scope.clone();
                async move {
                    let nested = scope.dispatch(message.clone()).await?;
                    Ok::<_, anyhow::Error>(json!({ "nested": nested }))
                }
            })))
        })
        .unwrap();

    let result = block_on(service.dispatch(message! { "service" => "echo" })).unwrap();

    assert_eq!(result, Some(json!({ "nested": null })));
    assert_eq!(logger.with_message("recursive dispatch rejected").len(), 1);
}

#[test]
fn root_scope_has_no_guard() {
    let (service, _) = recorded_service();
    let root = service.root();
    assert_eq!(root.kind(), ScopeKind::Root);
    assert!(root.guard().is_none());
    assert!(service.scope(&pattern! { "a" => 1 }).guard().is_none());
}
