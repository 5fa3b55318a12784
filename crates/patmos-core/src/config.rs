use serde::{Deserialize, Serialize};

use crate::matcher::Matcher;
use crate::observability::LogLevel;

/// 分发核心消费的配置。
///
/// # 教案式说明
/// - **意图 (Why)**：配置由外部加载器负责读取与合并，核心只定义自己需要的字段；
/// - **契约 (What)**：
///   - `gex` 控制通配符匹配，缺省开启；
///   - `log.level` 为日志阈值，缺省 `info`；
///   - 反序列化时缺失字段取缺省值，未知字段被忽略，便于与宿主的大配置共存；
/// - **执行逻辑 (How)**：派生 `serde`，任意格式（TOML、JSON 等）均可直接反序列化。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub gex: bool,
    pub log: LogConfig,
}

/// 日志相关配置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            gex: true,
            log: LogConfig::default(),
        }
    }
}

impl DispatchConfig {
    pub fn with_wildcards(mut self, enabled: bool) -> Self {
        self.gex = enabled;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log.level = level;
        self
    }

    /// 按当前配置构造匹配器。
    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.gex)
    }
}
