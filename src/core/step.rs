//! 步骤执行器：把一个已解析依赖的 Action 交给 ToolExecutor 执行
//!
//! 无论成功与否都返回统一的输出记录：{action, name, input, result, executed_at, success[, error]}；
//! 失败时错误原样返回，是否恢复由编排器决定。

use std::sync::Arc;

use serde_json::{json, Value};

use crate::core::EngineError;
use crate::plan::Action;
use crate::task::Agent;
use crate::tools::ToolExecutor;

/// 步骤失败：已包装的输出记录 + 原始错误
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub output: Value,
    pub error: EngineError,
}

/// 步骤执行器：持有工具执行器与始终放行的工具（兜底工具）
pub struct StepExecutor {
    tools: Arc<ToolExecutor>,
    always_allowed: Vec<String>,
}

impl StepExecutor {
    pub fn new(tools: Arc<ToolExecutor>) -> Self {
        Self {
            tools,
            always_allowed: Vec::new(),
        }
    }

    pub fn with_always_allowed(mut self, tool: impl Into<String>) -> Self {
        self.always_allowed.push(tool.into());
        self
    }

    fn permitted(&self, agent: &Agent, tool: &str) -> bool {
        agent.permits(tool) || self.always_allowed.iter().any(|t| t == tool)
    }

    /// 执行动作；工具可通过 agent.memory 读写共享状态
    pub async fn execute(&self, action: &Action, agent: &Agent) -> Result<Value, StepFailure> {
        let input = Value::Object(action.input.clone());
        let result = if self.permitted(agent, &action.tool) {
            self.tools
                .execute(&action.tool, input.clone(), &agent.memory)
                .await
        } else {
            Err(EngineError::ToolNotPermitted {
                tool: action.tool.clone(),
                agent: agent.id.clone(),
            })
        };

        let mut output = json!({
            "action": action.tool,
            "name": action.name,
            "input": input,
            "executed_at": chrono::Utc::now().to_rfc3339(),
        });
        match result {
            Ok(value) => {
                output["result"] = value;
                output["success"] = json!(true);
                Ok(output)
            }
            Err(error) => {
                output["result"] = Value::Null;
                output["success"] = json!(false);
                output["error"] = json!(error.to_string());
                Err(StepFailure { output, error })
            }
        }
    }
}
