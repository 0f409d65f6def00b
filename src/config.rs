//! 引擎配置：从 config/taskbee.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TASKBEE__*` 覆盖（双下划线表示嵌套，如 `TASKBEE__TOOLS__TOOL_TIMEOUT_SECS=10`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 配置根（对应 config/taskbee.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [engine] 段：计划解析与恢复策略
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// 扫描 JSON 前对响应截断的字符上限
    #[serde(default = "default_max_response_chars")]
    pub max_response_chars: usize,
    /// 兜底计划使用的安全工具；对所有 Agent 始终放行
    #[serde(default = "default_fallback_tool")]
    pub fallback_tool: String,
    /// 工具级失败时是否尝试一次 LLM 引导恢复
    #[serde(default = "default_recovery_enabled")]
    pub recovery_enabled: bool,
    /// 错误文本命中任一关键词才尝试恢复（大小写不敏感）
    #[serde(default = "default_recovery_keywords")]
    pub recovery_keywords: Vec<String>,
    #[serde(default = "default_thinking_start")]
    pub thinking_start: String,
    #[serde(default = "default_thinking_end")]
    pub thinking_end: String,
}

fn default_max_response_chars() -> usize {
    100_000
}

fn default_fallback_tool() -> String {
    "echo".to_string()
}

fn default_recovery_enabled() -> bool {
    true
}

fn default_recovery_keywords() -> Vec<String> {
    vec!["tool".into(), "parameter".into()]
}

fn default_thinking_start() -> String {
    "<think>".to_string()
}

fn default_thinking_end() -> String {
    "</think>".to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_response_chars: default_max_response_chars(),
            fallback_tool: default_fallback_tool(),
            recovery_enabled: default_recovery_enabled(),
            recovery_keywords: default_recovery_keywords(),
            thinking_start: default_thinking_start(),
            thinking_end: default_thinking_end(),
        }
    }
}

/// [tools] 段：工具调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 TASKBEE__* 可覆盖
///
/// 1. 按顺序查找 config/taskbee.toml、../config/taskbee.toml、taskbee.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TASKBEE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<EngineConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/taskbee", "../config/taskbee", "taskbee"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TASKBEE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
