//! 快照隔离与并发注册。
//!
//! - **Why**：注册以整表替换发布新快照，进行中的分发必须自始至终只看到它开始时的那一份；
//! - **How**：在 Tokio 多线程运行时中让分发停在请求中间件里，期间完成新的注册，再放行并观察结果。

use std::sync::Arc;

use patmos_core::{Message, RequestOutcome, handler_fn, message, middleware_fn, pattern};
use serde_json::{Value, json};
use tokio::sync::Notify;

use super::support::recorded_service;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .expect("测试运行时应能构建")
}

#[test]
fn in_flight_dispatch_keeps_its_snapshot() {
    let (service, _) = recorded_service();
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let (gate_entered, gate_release) = (entered.clone(), release.clone());
    service
        .use_middleware(pattern! { "gate" => true }, move |_| {
            Ok(Some(middleware_fn(move |message: Message| {
                let entered = gate_entered.clone();
                let release = gate_release.clone();
                async move {
                    entered.notify_one();
                    release.notified().await;
                    Ok(RequestOutcome::forward(message))
                }
            })))
        })
        .unwrap();

    runtime().block_on(async {
        let in_flight = tokio::spawn({
            let service = service.clone();
            async move { service.dispatch(message! { "gate" => true }).await }
        });

        entered.notified().await;
        service
            .attach(pattern! {}, |_| Ok(Some(handler_fn(|_| async { Ok(json!("late")) }))))
            .unwrap();
        release.notify_one();

        let stale = in_flight.await.expect("分发任务不应 panic").unwrap();
        assert_eq!(stale, None, "进行中的分发不应看到之后注册的客户端");

        let fresh = service.dispatch(message! { "cmd" => "after" }).await.unwrap();
        assert_eq!(fresh, Some(json!("late")));
    });
}

#[test]
fn concurrent_registrations_are_not_lost() {
    let (service, _) = recorded_service();

    runtime().block_on(async {
        let mut tasks = Vec::new();
        for worker in 0..8_i64 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                for item in 0..25_i64 {
                    let pattern = pattern! { "worker" => worker, "item" => item };
                    service
                        .add(pattern, handler_fn(|_| async { Ok(Value::Null) }))
                        .unwrap();
                    let _ = service.dispatch(message! { "worker" => worker }).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.expect("注册任务不应 panic");
        }
    });

    assert_eq!(service.snapshot().methods().len(), 200, "并发注册不得丢失更新");
    assert!(service.has(&pattern! { "worker" => 7, "item" => 24 }));
}

#[test]
fn concurrent_dispatches_do_not_cross_talk() {
    let (service, _) = recorded_service();
    service
        .attach(pattern! { "id" => "*" }, |_| {
            Ok(Some(handler_fn(|message: Message| async move {
                Ok(json!({ "echo": message.get("id").cloned().unwrap_or(Value::Null) }))
            })))
        })
        .unwrap();

    let results = runtime().block_on(async {
        let tasks: Vec<_> = (0..32_i64)
            .map(|id| {
                let service = service.clone();
                tokio::spawn(async move { (id, service.dispatch(message! { "id" => id }).await) })
            })
            .collect();
        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.expect("分发任务不应 panic"));
        }
        results
    });

    for (id, result) in results {
        assert_eq!(result.unwrap(), Some(json!({ "echo": id })));
    }
}
