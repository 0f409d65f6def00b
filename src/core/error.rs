//! 引擎错误类型
//!
//! 与 RecoveryPlanner 配合：工具级错误（ToolExecutionFailed / UnknownTool / ToolNotPermitted）可尝试一次 LLM 引导恢复，
//! 推理回调失败（Reasoning）对当前任务是致命的；查找失败（AgentNotFound / TaskNotFound）同步返回给调用方。

use thiserror::Error;

use crate::task::TaskStatus;

/// 引擎运行过程中可能出现的错误（查找、生命周期、推理、工具、等待超时等）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// 任务状态机不允许的转换（如对非 pending 任务再次执行）
    #[error("Invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// 任务已处于终态，拒绝任何后续修改
    #[error("Task already finalized: {0}")]
    TaskFinalized(String),

    #[error("Reasoning failed: {0}")]
    Reasoning(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool '{tool}' is not permitted for agent {agent}")]
    ToolNotPermitted { tool: String, agent: String },

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Recovery failed: {0}")]
    Recovery(String),

    /// 等待超时：与任务失败不同，任务本身继续在后台运行
    #[error("Timed out after {timeout_ms}ms waiting for task {task_id}")]
    WaitTimeout { task_id: String, timeout_ms: u64 },
}

impl EngineError {
    /// 工具自身报告的错误文本；基础设施类错误（超时、推理失败等）返回 None
    pub fn tool_message(&self) -> Option<String> {
        match self {
            EngineError::ToolExecutionFailed(msg) => Some(msg.clone()),
            EngineError::UnknownTool(_) | EngineError::ToolNotPermitted { .. } => {
                Some(self.to_string())
            }
            _ => None,
        }
    }
}
