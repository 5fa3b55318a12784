//! 日志字段键常量，保持注册、分发与守卫各调用点的命名一致。

/// 注册或查询所使用的模式（展示形式）。
pub const FIELD_PATTERN: &str = "patmos.pattern";
/// Scope 类型。
pub const FIELD_SCOPE_KIND: &str = "patmos.scope.kind";
/// 单次分发的请求序号。
pub const FIELD_REQUEST_ID: &str = "patmos.request.id";
/// 请求消息的 JSON 形式。
pub const FIELD_MESSAGE: &str = "patmos.message";
/// 分发结果的 JSON 形式。
pub const FIELD_RESULT: &str = "patmos.result";
/// 当前所处的分发阶段。
pub const FIELD_PHASE: &str = "patmos.dispatch.phase";
/// 阶段内命中的条目数量。
pub const FIELD_MATCHED: &str = "patmos.dispatch.matched";
/// 排队等待回放的响应函数数量。
pub const FIELD_QUEUED: &str = "patmos.dispatch.queued_responses";
/// 候选条目在本阶段中的位置（从 0 开始）。
pub const FIELD_POSITION: &str = "patmos.dispatch.position";
/// 客户端调用的尝试序号（从 1 开始）。
pub const FIELD_ATTEMPT: &str = "patmos.client.attempt";
/// 客户端允许的最大尝试次数。
pub const FIELD_MAX_ATTEMPTS: &str = "patmos.client.max_attempts";
/// 被移除的条目数量。
pub const FIELD_REMOVED: &str = "patmos.store.removed";
/// 注册调用的结果（`registered` / `declined`）。
pub const FIELD_OUTCOME: &str = "patmos.registration.outcome";
/// 分发是否产出了结果。
pub const FIELD_HAS_RESULT: &str = "patmos.dispatch.has_result";
