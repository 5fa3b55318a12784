//! 声明式注册计划与模块表解析。

use std::sync::{Arc, Mutex};

use futures::executor::block_on;
use patmos_core::{
    Handler, HandlerSpec, Message, ModuleTable, Pattern, RegistrationError, RegistrationPlan,
    RequestOutcome, Scope, ScopeKind, handler_fn, message, middleware_fn, pattern,
};
use serde_json::{Value, json};

use super::support::recorded_service;

type Journal = Arc<Mutex<Vec<&'static str>>>;

/// 客户端把消息转交给作用域内最匹配的本地方法。
fn local_client(scope: Scope) -> patmos_core::BoxHandler {
    handler_fn(move |message: Message| {
        let method = scope.find(&Pattern::from_message(&message));
        async move {
            match method {
                Some(entry) => entry.handler.call(message).await,
                None => Ok(Value::Null),
            }
        }
    })
}

fn modules(journal: Journal, servers: Arc<Mutex<Vec<Scope>>>) -> ModuleTable {
    let (j1, j2, j3, j4) = (journal.clone(), journal.clone(), journal.clone(), journal);
    ModuleTable::new()
        .client("local", "default", move |_, scope| {
            j1.lock().unwrap().push("client");
            Ok(Some(local_client(scope)))
        })
        .method("users", "get", move |args| {
            j2.lock().unwrap().push("method");
            let greeting = args.get("greeting").cloned().unwrap_or(json!("GET users"));
            Ok(handler_fn(move |_| {
                let greeting = greeting.clone();
                async move { Ok(json!({ "msg": greeting })) }
            }))
        })
        .middleware("timestamp", "default", move |args, _scope| {
            j3.lock().unwrap().push("middleware");
            let at = args.get("at").cloned().unwrap_or(Value::Null);
            Ok(Some(middleware_fn(move |mut message: Message| {
                message.insert("sentAt".into(), at.clone());
                async move { Ok(RequestOutcome::forward(message)) }
            })))
        })
        .server("rest", "server", move |_, scope| {
            j4.lock().unwrap().push("server");
            servers.lock().unwrap().push(scope);
            Ok(())
        })
}

#[test]
fn plan_applies_sections_in_fixed_order() {
    let (service, _) = recorded_service();
    let journal: Journal = Arc::default();
    let servers = Arc::new(Mutex::new(Vec::new()));
    let table = modules(journal.clone(), servers.clone());

    let plan = RegistrationPlan::new()
        .server(pattern! { "transport" => "rest" }, HandlerSpec::new("rest").export("server"))
        .middleware(pattern! {}, HandlerSpec::new("timestamp").args(json!({ "at": 5 })))
        .scope(
            pattern! { "resource" => "users" },
            RegistrationPlan::new()
                .method(pattern! { "method" => "GET" }, HandlerSpec::new("users").export("get")),
        )
        .client(pattern! {}, HandlerSpec::new("local"));

    plan.apply(&service.root(), &table).unwrap();

    assert_eq!(
        *journal.lock().unwrap(),
        ["client", "middleware", "server", "method"],
        "应用顺序必须是 客户端 → 方法 → 中间件 → 服务端 → 子作用域"
    );
    assert!(service.has(&pattern! { "resource" => "users", "method" => "GET" }));

    let servers = servers.lock().unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].kind(), ScopeKind::Server);
    assert_eq!(servers[0].pattern(), &pattern! { "transport" => "rest" });
}

#[test]
fn planned_service_dispatches_end_to_end() {
    let (service, _) = recorded_service();
    let table = modules(Arc::default(), Arc::default());
    RegistrationPlan::new()
        .client(pattern! { "resource" => "users" }, HandlerSpec::new("local"))
        .scope(
            pattern! { "resource" => "users" },
            RegistrationPlan::new().method(
                pattern! { "method" => "GET" },
                HandlerSpec::new("users")
                    .export("get")
                    .args(json!({ "greeting": "hello users" })),
            ),
        )
        .apply(&service.root(), &table)
        .unwrap();

    let result = block_on(service.dispatch(message! {
        "resource" => "users",
        "method" => "GET",
        "item" => 123,
    }))
    .unwrap();

    assert_eq!(result, Some(json!({ "msg": "hello users" })));
}

#[test]
fn unresolved_handler_aborts_remaining_sections() {
    let (service, _) = recorded_service();
    let journal: Journal = Arc::default();
    let table = modules(journal.clone(), Arc::default());

    let err = RegistrationPlan::new()
        .client(pattern! {}, HandlerSpec::new("local"))
        .method(pattern! { "cmd" => "x" }, HandlerSpec::new("missing"))
        .middleware(pattern! {}, HandlerSpec::new("timestamp"))
        .apply(&service.root(), &table)
        .unwrap_err();

    match err {
        RegistrationError::Unresolved { module, export } => {
            assert_eq!(module, "missing");
            assert_eq!(export, "default");
        }
        other => panic!("意外的错误类型: {other:?}"),
    }
    assert_eq!(*journal.lock().unwrap(), ["client"], "失败之后的段不应再执行");
    assert_eq!(service.snapshot().clients().len(), 1, "失败之前的注册保持生效");
    assert!(service.snapshot().middleware().is_empty());
}

#[test]
fn failing_factory_is_a_registration_error() {
    let (service, _) = recorded_service();
    let table = ModuleTable::new().middleware("auth", "default", |_, _| {
        Err(anyhow::anyhow!("signing key missing"))
    });

    let err = RegistrationPlan::new()
        .middleware(pattern! { "secure" => true }, HandlerSpec::new("auth"))
        .apply(&service.root(), &table)
        .unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::Factory { ref pattern, .. } if pattern == "{secure=true}"
    ));
    assert_eq!(
        std::error::Error::source(&err).map(ToString::to_string),
        Some("signing key missing".to_owned())
    );
    assert!(service.snapshot().middleware().is_empty());
}
