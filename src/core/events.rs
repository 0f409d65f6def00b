//! 任务执行事件：供宿主流式展示推理、计划、步骤与恢复过程

use serde::Serialize;

/// 单个事件（可序列化为 JSON）；index 为步骤在 Task.steps 中的下标
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    TaskStarted {
        task_id: String,
    },
    /// 正在调用推理回调
    Thinking {
        task_id: String,
    },
    /// 计划已解析；fallback 表示模型输出无法解析而使用了兜底计划
    PlanParsed {
        task_id: String,
        steps: usize,
        fallback: bool,
    },
    StepStarted {
        task_id: String,
        index: usize,
        name: String,
        tool: String,
    },
    StepCompleted {
        task_id: String,
        index: usize,
        progress: f64,
    },
    StepFailed {
        task_id: String,
        index: usize,
        error: String,
    },
    /// 一次恢复尝试（每个失败步骤至多一次）
    RecoveryAttempted {
        task_id: String,
        index: usize,
        tool: String,
        succeeded: bool,
    },
    TaskCompleted {
        task_id: String,
    },
    TaskFailed {
        task_id: String,
        error: String,
    },
    TaskCancelled {
        task_id: String,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::TaskStarted { task_id }
            | TaskEvent::Thinking { task_id }
            | TaskEvent::PlanParsed { task_id, .. }
            | TaskEvent::StepStarted { task_id, .. }
            | TaskEvent::StepCompleted { task_id, .. }
            | TaskEvent::StepFailed { task_id, .. }
            | TaskEvent::RecoveryAttempted { task_id, .. }
            | TaskEvent::TaskCompleted { task_id }
            | TaskEvent::TaskFailed { task_id, .. }
            | TaskEvent::TaskCancelled { task_id } => task_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEvent::TaskCompleted { .. }
                | TaskEvent::TaskFailed { .. }
                | TaskEvent::TaskCancelled { .. }
        )
    }
}
