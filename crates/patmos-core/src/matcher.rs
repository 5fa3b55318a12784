use serde_json::Value;

use crate::pattern::{Pattern, WILDCARD};

/// 模式匹配器：回答“模式 A 是否匹配候选 B”。
///
/// # 教案式说明
/// - **意图 (Why)**：注册表、作用域守卫与分发引擎都依赖同一条子集判定规则，集中实现避免语义漂移；
/// - **契约 (What)**：
///   - `matches(pattern, candidate)` 为真当且仅当 `pattern` 的每个键都存在于 `candidate`，
///     且对应值为通配符（启用时）或与候选值严格相等；
///   - 空模式匹配任意候选；
///   - `wildcards == false` 时 `"*"` 只是普通字面量；
/// - **执行逻辑 (How)**：无状态，逐键比较，短路返回。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Matcher {
    wildcards: bool,
}

impl Matcher {
    pub const fn new(wildcards: bool) -> Self {
        Self { wildcards }
    }

    pub const fn wildcards(&self) -> bool {
        self.wildcards
    }

    pub fn matches(&self, pattern: &Pattern, candidate: &Pattern) -> bool {
        pattern.iter().all(|(key, expected)| {
            candidate
                .get(key)
                .is_some_and(|actual| self.value_matches(expected, actual))
        })
    }

    /// 模式的特异度：受约束键的数量。
    pub fn specificity(pattern: &Pattern) -> usize {
        pattern.len()
    }

    fn value_matches(&self, expected: &Value, actual: &Value) -> bool {
        if self.wildcards && expected.as_str() == Some(WILDCARD) {
            return true;
        }
        expected == actual
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(true)
    }
}
