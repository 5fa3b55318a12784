//! # store 模块说明
//!
//! ## 角色定位（Why）
//! - 提供不可变路由表：方法、中间件、客户端三类条目共享同一结构 [`Entry`]；
//! - 正在进行的分发可能持有旧表，而注册在别处并发发生，原地修改会破坏进行中的匹配。
//!
//! ## 设计要求（What）
//! - `add`/`remove` 返回新表，原表保持不变；
//! - 条目按插入顺序保存，插入顺序即特异度相同时的决胜依据（后插入者胜）。
//!
//! ## 实现策略（How）
//! - 底层使用 `im::Vector`，新旧表共享未改动的节点，克隆为 `O(1)`。

use im::Vector;

use crate::matcher::Matcher;
use crate::pattern::Pattern;

/// 路由表条目。
#[derive(Clone, Debug)]
pub struct Entry<H> {
    pub pattern: Pattern,
    pub handler: H,
}

impl<H> Entry<H> {
    pub fn new(pattern: Pattern, handler: H) -> Self {
        Self { pattern, handler }
    }
}

/// 不可变的模式路由表。
///
/// # 教案式说明
/// - **意图 (Why)**：把“最佳匹配查找”与“子集列举”这两种访问方式固定在同一份有序数据上；
/// - **契约 (What)**：
///   - `find` 在匹配子集中取特异度最高者，特异度相同取最晚插入者；
///   - `list` 返回全部匹配条目，保持插入顺序，不去重；
///   - `remove` 只删除模式结构相等的条目，不删除“能匹配”的条目；
/// - **执行逻辑 (How)**：线性扫描；表规模为注册数量级，扫描成本远低于一次处理器调用。
#[derive(Clone, Debug)]
pub struct PatternStore<H: Clone> {
    entries: Vector<Entry<H>>,
    matcher: Matcher,
}

impl<H: Clone> PatternStore<H> {
    pub fn new(matcher: Matcher) -> Self {
        Self {
            entries: Vector::new(),
            matcher,
        }
    }

    pub fn matcher(&self) -> Matcher {
        self.matcher
    }

    /// 追加条目，返回新表。已有结构相同的模式时两者并存，新条目排在后面。
    #[must_use]
    pub fn add(&self, pattern: Pattern, handler: H) -> Self {
        let mut entries = self.entries.clone();
        entries.push_back(Entry::new(pattern, handler));
        Self {
            entries,
            matcher: self.matcher,
        }
    }

    pub fn find(&self, query: &Pattern) -> Option<&Entry<H>> {
        self.entries
            .iter()
            .filter(|entry| self.matcher.matches(&entry.pattern, query))
            .max_by_key(|entry| Matcher::specificity(&entry.pattern))
    }

    pub fn list(&self, query: &Pattern) -> Vec<&Entry<H>> {
        self.entries
            .iter()
            .filter(|entry| self.matcher.matches(&entry.pattern, query))
            .collect()
    }

    /// 删除所有与 `pattern` 结构相等的条目，返回新表。
    #[must_use]
    pub fn remove(&self, pattern: &Pattern) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|entry| entry.pattern != *pattern)
            .cloned()
            .collect();
        Self {
            entries,
            matcher: self.matcher,
        }
    }

    pub fn has(&self, pattern: &Pattern) -> bool {
        self.find(pattern).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry<H>> {
        self.entries.iter()
    }
}

impl<H: Clone> Default for PatternStore<H> {
    fn default() -> Self {
        Self::new(Matcher::default())
    }
}
