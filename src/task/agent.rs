//! Agent：身份、系统提示词、允许的工具集合与私有记忆
//!
//! 状态机：idle → thinking → acting → {completed | error}；由 Orchestrator 在执行任务时推进。

use serde::{Deserialize, Serialize};

use crate::memory::AgentMemory;

/// Agent 阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    /// 正在请求模型推理
    Thinking,
    /// 计划已解析，正在执行工具
    Acting,
    Completed,
    Error,
}

/// Agent 定义；进程生命周期内常驻
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    /// 允许使用的工具名；为空表示注册表中全部工具
    pub tools: Vec<String>,
    pub state: AgentState,
    /// 跨任务共享的键值记忆（不参与序列化）
    #[serde(skip)]
    pub memory: AgentMemory,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: Vec<String>,
    ) -> Self {
        Self {
            id: format!("agent_{}", uuid::Uuid::new_v4()),
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            tools,
            state: AgentState::Idle,
            memory: AgentMemory::default(),
        }
    }

    /// 是否允许调用指定工具
    pub fn permits(&self, tool: &str) -> bool {
        self.tools.is_empty() || self.tools.iter().any(|t| t == tool)
    }
}
