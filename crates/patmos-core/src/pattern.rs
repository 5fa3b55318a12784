//! # pattern 模块说明
//!
//! ## 角色定位（Why）
//! - 模式既是注册时的过滤条件，也是分发时由消息反向构造出的查找键；
//! - 统一的值类型让匹配器、存储与作用域共享同一套键值语义。
//!
//! ## 设计要求（What）
//! - 模式按键有序（`BTreeMap`），两个模式结构相等当且仅当键集与各键的值完全一致；
//! - 消息与模式都以 JSON 值承载，匹配时比较遵循 `serde_json::Value` 的相等语义，
//!   即区分大小写也区分类型（`1` 与 `"1"` 不相等）；
//! - 通配符为字符串字面量 [`WILDCARD`]，是否生效由 [`Matcher`](crate::Matcher) 决定。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PatternError;

/// 被分发的消息：一个 JSON 对象。
pub type Message = Map<String, Value>;

/// 通配符标记，表示“该键存在即可，不限取值”。
pub const WILDCARD: &str = "*";

/// 结构化模式：键到字面值（或通配符）的有序映射。
///
/// # 教案式说明
/// - **意图 (Why)**：为注册表提供不可变、可比较、可合并的路由键；
/// - **契约 (What)**：
///   - 一经存入 [`PatternStore`](crate::PatternStore) 即不再修改，所有变换都返回新值；
///   - `specificity` 等于键的数量，由 [`Matcher::specificity`](crate::Matcher::specificity) 使用；
/// - **执行逻辑 (How)**：内部使用 `BTreeMap<String, Value>`，序列化形式即 JSON 对象；
/// - **设计权衡 (Trade-offs)**：有序映射让展示名稳定、比较廉价，代价是插入为 `O(log n)`，
///   对通常只有几个键的模式可以忽略。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern {
    fields: BTreeMap<String, Value>,
}

impl Pattern {
    /// 空模式，匹配任意消息。
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 值构造模式，非对象输入视为编程错误。
    pub fn from_json(value: Value) -> Result<Self, PatternError> {
        match value {
            Value::Object(map) => Ok(Self::from_message(&map)),
            other => Err(PatternError::NotAnObject {
                found: json_kind(&other),
            }),
        }
    }

    /// 由消息构造反向测试模式：消息的每个键都成为查找条件。
    pub fn from_message(message: &Message) -> Self {
        message
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// 追加一个键值并返回新模式（构造期使用）。
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// 右偏合并：`overlay` 中的键覆盖当前模式的同名键。
    ///
    /// 作用域注册时以 `pattern.merge(&scope_base)` 的方式调用，因此作用域基础模式总是胜出。
    pub fn merge(&self, overlay: &Pattern) -> Pattern {
        let mut fields = self.fields.clone();
        for (key, value) in &overlay.fields {
            fields.insert(key.clone(), value.clone());
        }
        Pattern { fields }
    }

    /// 把模式覆盖进消息，返回新消息；模式中的键覆盖消息的同名键。
    pub fn overlay_onto(&self, message: &Message) -> Message {
        let mut merged = message.clone();
        for (key, value) in &self.fields {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// 转换为消息对象。
    pub fn to_message(&self) -> Message {
        self.fields
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// 日志中使用的展示名：`{k=v,...}`，空模式为 `{default}`。
    ///
    /// 字符串值不带引号输出，其余值使用 JSON 文本形式。
    pub fn display_name(&self) -> String {
        if self.fields.is_empty() {
            return "{default}".to_owned();
        }
        let body = self
            .fields
            .iter()
            .map(|(key, value)| match value {
                Value::String(text) => format!("{key}={text}"),
                other => format!("{key}={other}"),
            })
            .collect::<Vec<_>>()
            .join(",");
        format!("{{{body}}}")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Pattern {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl TryFrom<Value> for Pattern {
    type Error = PatternError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

impl From<&Message> for Pattern {
    fn from(message: &Message) -> Self {
        Self::from_message(message)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 以 `"key" => value` 列表构造 [`Pattern`]。
///
/// ```
/// use patmos_core::pattern;
///
/// let users = pattern! { "resource" => "users", "method" => "GET" };
/// assert_eq!(users.display_name(), "{method=GET,resource=users}");
/// assert!(pattern! {}.is_empty());
/// ```
#[macro_export]
macro_rules! pattern {
    () => { $crate::Pattern::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::Pattern::new()$(.with($key, $crate::__private::serde_json::json!($value)))+
    };
}

/// 以 `"key" => value` 列表构造 [`Message`]。
///
/// ```
/// use patmos_core::message;
///
/// let request = message! { "resource" => "users", "item" => 123 };
/// assert_eq!(request["item"], 123);
/// ```
#[macro_export]
macro_rules! message {
    () => { $crate::Message::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut message = $crate::Message::new();
        $(message.insert(::std::string::String::from($key), $crate::__private::serde_json::json!($value));)+
        message
    }};
}
