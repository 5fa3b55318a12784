//! 日志阈值与注册期事件。

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use futures::executor::block_on;
use patmos_core::observability::keys::{
    FIELD_OUTCOME, FIELD_PATTERN, FIELD_REMOVED, FIELD_SCOPE_KIND,
};
use patmos_core::observability::{LogLevel, TracingLogger};
use patmos_core::{DispatchConfig, Service, handler_fn, message, pattern};
use serde_json::json;
use tracing_test::traced_test;

use super::support::{RecordingLogger, counting_client, recorded_service};

#[test]
fn info_threshold_drops_verbose_records() {
    let logger = Arc::new(RecordingLogger::default());
    let service = Service::with_logger(DispatchConfig::default(), logger.clone());
    service
        .attach(pattern! {}, |_| {
            Ok(Some(counting_client(Arc::new(AtomicUsize::new(0)), 1, json!("ok"))))
        })
        .unwrap();

    let result = block_on(service.dispatch(message! { "cmd" => "ping" })).unwrap();
    assert_eq!(result, Some(json!("ok")));

    let records = logger.records();
    assert!(!records.is_empty());
    assert!(
        records.iter().all(|record| record.level <= LogLevel::Info),
        "info 阈值下不应出现 debug/silly 记录: {records:?}"
    );
    assert_eq!(logger.with_message("dispatch started").len(), 1);
    assert_eq!(logger.with_message("dispatch completed").len(), 1);
    assert!(logger.with_message("client attempt failed").is_empty());
}

#[test]
fn silly_threshold_keeps_everything() {
    let (service, logger) = recorded_service();
    service
        .attach(pattern! {}, |_| {
            Ok(Some(counting_client(Arc::new(AtomicUsize::new(0)), 1, json!("ok"))))
        })
        .unwrap();

    block_on(service.dispatch(message! { "cmd" => "ping" })).unwrap();

    let records = logger.records();
    assert!(records.iter().any(|record| record.level == LogLevel::Debug));
    assert!(records.iter().any(|record| record.level == LogLevel::Silly));
}

#[test]
fn registrations_are_logged_with_outcome() {
    let (service, logger) = recorded_service();
    let scope = service.scope(&pattern! { "role" => "store" });

    scope
        .add(pattern! { "cmd" => "get" }, handler_fn(|_| async { Ok(json!(1)) }))
        .unwrap()
        .use_middleware(pattern! {}, |_| Ok(None))
        .unwrap()
        .attach(pattern! { "cmd" => "*" }, |_| {
            Ok(Some(handler_fn(|_| async { Ok(json!(null)) })))
        })
        .unwrap()
        .expose(pattern! { "transport" => "rest" }, |_| Ok(()))
        .unwrap();

    let added = logger.with_message("method added");
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].level, LogLevel::Info);
    assert_eq!(added[0].field(FIELD_PATTERN), Some("{cmd=get,role=store}"));
    assert_eq!(added[0].field(FIELD_SCOPE_KIND), Some("root"));
    assert_eq!(added[0].field(FIELD_OUTCOME), Some("registered"));

    let middleware = logger.with_message("middleware used");
    assert_eq!(middleware.len(), 1);
    assert_eq!(middleware[0].field(FIELD_OUTCOME), Some("declined"));
    assert_eq!(middleware[0].field(FIELD_PATTERN), Some("{role=store}"));

    let attached = logger.with_message("client attached");
    assert_eq!(attached[0].field(FIELD_OUTCOME), Some("registered"));

    let exposed = logger.with_message("server exposed");
    assert_eq!(
        exposed[0].field(FIELD_PATTERN),
        Some("{role=store,transport=rest}")
    );

    assert!(service.snapshot().middleware().is_empty());
    assert_eq!(service.snapshot().clients().len(), 1);
}

#[test]
fn removal_reports_removed_count() {
    let (service, logger) = recorded_service();
    service
        .add(pattern! { "a" => 1 }, handler_fn(|_| async { Ok(json!("first")) }))
        .unwrap()
        .add(pattern! { "a" => 1 }, handler_fn(|_| async { Ok(json!("second")) }))
        .unwrap()
        .add(pattern! { "a" => 1, "b" => 2 }, handler_fn(|_| async { Ok(json!("third")) }))
        .unwrap()
        .remove(&pattern! { "a" => 1 })
        .unwrap()
        .remove(&pattern! { "a" => 9 })
        .unwrap();

    let removed = logger.with_message("method removed");
    assert_eq!(removed.len(), 2);
    assert_eq!(removed[0].field(FIELD_REMOVED), Some("2"));
    assert_eq!(removed[1].field(FIELD_REMOVED), Some("0"));
    assert!(service.has(&pattern! { "a" => 1, "b" => 2 }));
}

#[traced_test]
#[test]
fn default_logger_forwards_to_tracing() {
    let service = Service::builder(DispatchConfig::default())
        .logger(Arc::new(TracingLogger::new()))
        .build();
    service
        .add(pattern! { "cmd" => "get" }, handler_fn(|_| async { Ok(json!(1)) }))
        .unwrap();

    assert!(logs_contain("method added"));
    assert!(logs_contain("patmos.pattern={cmd=get}"));
}
