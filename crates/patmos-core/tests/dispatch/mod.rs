//! 分发核心集成测试。
//!
//! # 教案级导览
//!
//! - **Why**：从公开 API 出发验证路由表排序、分发管线、递归守卫、快照隔离与声明式注册，
//!   与各模块内的单元测试互补；
//! - **How**：异步场景统一用 `futures::executor::block_on` 驱动，并发场景使用 Tokio 多线程运行时，
//!   日志断言借助 [`support::RecordingLogger`]；
//! - **What**：每个子模块聚焦一类行为，失败信息直接指向违反的契约。

mod concurrency;
mod guard;
mod logging;
mod plan;
