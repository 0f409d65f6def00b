//! 任务与步骤类型定义
//!
//! Task 归属于一个 Agent（通过 agent_id 反向引用），状态机：pending → running → {completed | failed | cancelled}。
//! 步骤只追加、不删除；进入终态后任务不再接受任何修改。

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::EngineError;

/// 推理步骤的固定名称；是否计入依赖解析序号由 StepKind 决定，不看名称
pub const REASONING_STEP_NAME: &str = "llm_reasoning";

/// 任务状态（步骤状态复用同一组取值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 等待执行
    Pending,
    /// 正在执行
    Running,
    /// 已完成
    Completed,
    /// 执行失败
    Failed,
    /// 已取消
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 步骤类别；由引擎设置，不取自模型输出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// 推理过程（每次执行至多一个）
    Reasoning,
    /// 一次工具调用
    #[default]
    Action,
}

/// 任务中的单个步骤：推理过程或一次工具调用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub kind: StepKind,
    pub name: String,
    pub description: String,
    pub input: Map<String, Value>,
    /// 执行结果，完成前为空
    pub output: Option<Value>,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl Step {
    /// 创建一个已开始（running）的工具步骤
    pub fn started(
        name: impl Into<String>,
        description: impl Into<String>,
        input: Map<String, Value>,
    ) -> Self {
        Self::with_kind(StepKind::Action, name.into(), description.into(), input)
    }

    /// 创建一个已开始的推理步骤，名称固定为 llm_reasoning
    pub fn reasoning(description: impl Into<String>) -> Self {
        Self::with_kind(
            StepKind::Reasoning,
            REASONING_STEP_NAME.to_string(),
            description.into(),
            Map::new(),
        )
    }

    fn with_kind(
        kind: StepKind,
        name: String,
        description: String,
        input: Map<String, Value>,
    ) -> Self {
        Self {
            id: format!("step_{}", uuid::Uuid::new_v4()),
            kind,
            name,
            description,
            input,
            output: None,
            status: TaskStatus::Running,
            error: None,
            started_at: Some(now_millis()),
            completed_at: None,
        }
    }

    pub fn is_reasoning(&self) -> bool {
        self.kind == StepKind::Reasoning
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// 任务：由 Orchestrator 独占修改，外部只读快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub agent_id: String,
    pub title: String,
    pub description: String,
    pub input: Map<String, Value>,
    pub output: Option<Value>,
    pub status: TaskStatus,
    /// 已完成计划步骤的比例（0.0 - 1.0）
    pub progress: f64,
    pub steps: Vec<Step>,
    pub error: Option<String>,
    /// 创建时间（毫秒时间戳）
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl Task {
    pub fn new(
        agent_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        input: Map<String, Value>,
    ) -> Self {
        Self {
            id: format!("task_{}", uuid::Uuid::new_v4()),
            agent_id: agent_id.into(),
            title: title.into(),
            description: description.into(),
            input,
            output: None,
            status: TaskStatus::Pending,
            progress: 0.0,
            steps: Vec::new(),
            error: None,
            created_at: now_millis(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        match self.status {
            TaskStatus::Running => Ok(()),
            s if s.is_terminal() => Err(EngineError::TaskFinalized(self.id.clone())),
            s => Err(EngineError::InvalidTransition {
                task_id: self.id.clone(),
                from: s,
                to: TaskStatus::Running,
            }),
        }
    }

    /// pending → running，并记录 started_at
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.status != TaskStatus::Pending {
            return Err(EngineError::InvalidTransition {
                task_id: self.id.clone(),
                from: self.status,
                to: TaskStatus::Running,
            });
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(now_millis());
        Ok(())
    }

    /// 追加步骤，返回其下标
    pub fn push_step(&mut self, step: Step) -> Result<usize, EngineError> {
        self.ensure_running()?;
        self.steps.push(step);
        Ok(self.steps.len() - 1)
    }

    fn open_step(&mut self, index: usize) -> Result<&mut Step, EngineError> {
        self.ensure_running()?;
        let task_id = self.id.clone();
        let step = self
            .steps
            .get_mut(index)
            .ok_or_else(|| EngineError::TaskFinalized(format!("{task_id} (no step {index})")))?;
        if step.is_finished() {
            return Err(EngineError::TaskFinalized(format!("{task_id} (step {index})")));
        }
        Ok(step)
    }

    pub fn complete_step(&mut self, index: usize, output: Value) -> Result<(), EngineError> {
        let step = self.open_step(index)?;
        step.output = Some(output);
        step.status = TaskStatus::Completed;
        step.completed_at = Some(now_millis());
        Ok(())
    }

    pub fn fail_step(
        &mut self,
        index: usize,
        error: impl Into<String>,
        output: Option<Value>,
    ) -> Result<(), EngineError> {
        let step = self.open_step(index)?;
        step.output = output;
        step.error = Some(error.into());
        step.status = TaskStatus::Failed;
        step.completed_at = Some(now_millis());
        Ok(())
    }

    /// 推进进度：只增不减，且 1.0 只在 complete 时设置
    pub fn advance_progress(&mut self, progress: f64) -> Result<(), EngineError> {
        self.ensure_running()?;
        if progress > self.progress && progress < 1.0 {
            self.progress = progress;
        }
        Ok(())
    }

    /// running → completed：progress 置 1.0，记录 completed_at
    pub fn complete(&mut self, output: Option<Value>) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.status = TaskStatus::Completed;
        self.progress = 1.0;
        self.output = output;
        self.completed_at = Some(now_millis());
        Ok(())
    }

    /// running → failed：记录错误，progress 保持上一次成功的值
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(now_millis());
        Ok(())
    }

    /// running → cancelled；非 running 状态不处理，返回 false
    pub fn cancel(&mut self) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(now_millis());
        true
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn running_task() -> Task {
        let mut task = Task::new("agent_1", "Multiply", "3 * 15", Map::new());
        task.start().unwrap();
        task
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new("agent_1", "t", "d", Map::new());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0.0);
        assert!(task.id.starts_with("task_"));
        assert!(task.started_at.is_none());
    }

    #[test]
    fn test_start_only_from_pending() {
        let mut task = running_task();
        assert!(task.started_at.is_some());
        let err = task.start().unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_progress_is_monotonic_and_below_one() {
        let mut task = running_task();
        task.advance_progress(0.5).unwrap();
        task.advance_progress(0.25).unwrap();
        assert_eq!(task.progress, 0.5);
        task.advance_progress(1.0).unwrap();
        assert_eq!(task.progress, 0.5);
        task.complete(None).unwrap();
        assert_eq!(task.progress, 1.0);
    }

    #[test]
    fn test_terminal_task_rejects_mutation() {
        let mut task = running_task();
        let idx = task
            .push_step(Step::started("add", "", Map::new()))
            .unwrap();
        task.fail("boom").unwrap();

        assert!(matches!(
            task.push_step(Step::started("x", "", Map::new())),
            Err(EngineError::TaskFinalized(_))
        ));
        assert!(task.complete_step(idx, json!(1)).is_err());
        assert!(task.complete(None).is_err());
        assert!(task.advance_progress(0.9).is_err());
        assert!(!task.cancel());
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("boom"));
        assert_eq!(task.steps.len(), 1);
    }

    #[test]
    fn test_finished_step_is_immutable() {
        let mut task = running_task();
        let idx = task
            .push_step(Step::started("add", "", Map::new()))
            .unwrap();
        task.complete_step(idx, json!({"result": 5})).unwrap();
        assert!(task.fail_step(idx, "late", None).is_err());
        assert_eq!(task.steps[idx].status, TaskStatus::Completed);
    }

    #[test]
    fn test_cancel_only_while_running() {
        let mut pending = Task::new("agent_1", "t", "d", Map::new());
        assert!(!pending.cancel());

        let mut task = running_task();
        assert!(task.cancel());
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_step_kind_set_by_constructor() {
        let reasoning = Step::reasoning("plan");
        assert!(reasoning.is_reasoning());
        assert_eq!(reasoning.name, REASONING_STEP_NAME);

        let action = Step::started(REASONING_STEP_NAME, "", Map::new());
        assert_eq!(action.kind, StepKind::Action);
        assert!(!action.is_reasoning());

        let v = serde_json::to_value(&reasoning).unwrap();
        assert_eq!(v["kind"], "reasoning");
    }

    #[test]
    fn test_serialized_field_names() {
        let task = Task::new("agent_1", "t", "d", Map::new());
        let v = serde_json::to_value(&task).unwrap();
        for key in [
            "id", "agent_id", "title", "description", "input", "output", "status", "progress",
            "steps", "error", "created_at", "started_at", "completed_at",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(v["status"], "pending");
    }
}
