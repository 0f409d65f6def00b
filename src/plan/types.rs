//! 计划类型：Plan（分析 + 有序动作 + 推理）与 Action（单个工具调用规格）
//!
//! Plan 是瞬态结构，仅作为推理步骤的输出保存；展开为任务步骤后即丢弃。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 模型规划出的一个动作：{name, description, tool, input}
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    pub tool: String,
    /// 开放参数表：字符串到任意 JSON 值
    #[serde(
        default,
        alias = "parameters",
        alias = "params",
        alias = "args",
        deserialize_with = "nullable"
    )]
    pub input: Map<String, Value>,
}

impl Action {
    pub fn new(tool: impl Into<String>, input: Map<String, Value>) -> Self {
        let tool = tool.into();
        Self {
            name: tool.clone(),
            description: String::new(),
            tool,
            input,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// 解析后的计划；缺失的 analysis / reasoning 视为空字符串，缺失的 steps 视为空计划
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, deserialize_with = "nullable")]
    pub analysis: String,
    #[serde(default, alias = "actions", deserialize_with = "nullable")]
    pub steps: Vec<Action>,
    #[serde(default, deserialize_with = "nullable")]
    pub reasoning: String,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// 推理步骤的输出形态：{analysis, plan, reasoning}
    pub fn to_reasoning_output(&self) -> Value {
        serde_json::json!({
            "analysis": self.analysis,
            "plan": self.steps,
            "reasoning": self.reasoning,
        })
    }
}

/// null 按默认值处理（模型常输出 "steps": null）
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
