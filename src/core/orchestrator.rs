//! 任务编排器：Agent / Task 注册表与单次任务执行循环
//!
//! execute_task 的流程：
//! 1. 任务 pending → running，Agent 进入 thinking，追加 llm_reasoning 步骤并调用推理回调
//! 2. 用 PlanParser 解析回复（无法解析时得到兜底计划），推理步骤完成，Agent 进入 acting
//! 3. 按顺序执行每个动作：先解析对前序结果的引用，再交给 StepExecutor；
//!    工具级失败至多尝试一次 LLM 引导恢复，恢复后仍失败则整个任务失败
//! 4. 每完成一步 progress 单调上升；最后一步完成时任务 completed、progress = 1.0
//!
//! 推理回调失败使任务 failed，但 execute_task 仍返回 Ok(快照)；只有查找失败与非法状态转换同步返回 Err。
//! 任务被取消后，执行循环在下一次修改任务时收到 TaskFinalized 并静默退出。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::core::{EngineError, RecoveryPlanner, StepExecutor, StepFailure, TaskEvent};
use crate::llm::ReasoningClient;
use crate::memory::AgentMemory;
use crate::plan::{build_reasoning_prompt, Action, DependencyResolver, PlanParser};
use crate::task::{Agent, AgentState, Step, Task, TaskStatus};
use crate::tools::{ToolExecutor, ToolRegistry};

/// 单个任务的运行时句柄：任务本体、状态广播与取消令牌
struct TaskEntry {
    id: String,
    task: RwLock<Task>,
    status_tx: watch::Sender<TaskStatus>,
    cancel: CancellationToken,
}

impl TaskEntry {
    fn new(task: Task) -> Self {
        let (status_tx, _) = watch::channel(task.status);
        Self {
            id: task.id.clone(),
            task: RwLock::new(task),
            status_tx,
            cancel: CancellationToken::new(),
        }
    }

    fn publish(&self, status: TaskStatus) {
        self.status_tx.send_replace(status);
    }

    fn check_cancelled(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::TaskFinalized(self.id.clone()));
        }
        Ok(())
    }
}

/// 任务编排器；通过 Arc 在多个 tokio 任务间共享
pub struct TaskOrchestrator {
    agents: RwLock<HashMap<String, Arc<RwLock<Agent>>>>,
    tasks: RwLock<HashMap<String, Arc<TaskEntry>>>,
    reasoner: Arc<dyn ReasoningClient>,
    tools: Arc<ToolExecutor>,
    parser: PlanParser,
    resolver: DependencyResolver,
    step_executor: StepExecutor,
    recovery: RecoveryPlanner,
    event_tx: Option<mpsc::UnboundedSender<TaskEvent>>,
}

impl TaskOrchestrator {
    /// 使用默认配置创建
    pub fn new(reasoner: Arc<dyn ReasoningClient>, registry: Arc<ToolRegistry>) -> Self {
        Self::from_config(reasoner, registry, &EngineConfig::default())
    }

    pub fn from_config(
        reasoner: Arc<dyn ReasoningClient>,
        registry: Arc<ToolRegistry>,
        config: &EngineConfig,
    ) -> Self {
        if !registry.contains(&config.engine.fallback_tool) {
            tracing::warn!(
                "Fallback tool '{}' is not registered; unparseable plans will fail",
                config.engine.fallback_tool
            );
        }
        let tools = Arc::new(ToolExecutor::new(registry, config.tools.tool_timeout_secs));
        let parser = PlanParser::from_config(&config.engine);
        let step_executor = StepExecutor::new(Arc::clone(&tools))
            .with_always_allowed(config.engine.fallback_tool.clone());
        let recovery =
            RecoveryPlanner::from_config(Arc::clone(&reasoner), parser.clone(), &config.engine);
        Self {
            agents: RwLock::new(HashMap::new()),
            tasks: RwLock::new(HashMap::new()),
            reasoner,
            tools,
            parser,
            resolver: DependencyResolver::new(),
            step_executor,
            recovery,
            event_tx: None,
        }
    }

    /// 订阅执行事件；接收端关闭后事件被丢弃
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<TaskEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn emit(&self, event: TaskEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    // ---------- Agent ----------

    /// 创建并注册 Agent，返回其快照
    pub async fn create_agent(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: Vec<String>,
    ) -> Agent {
        let agent = Agent::new(name, description, system_prompt, tools);
        self.register_agent(agent.clone()).await;
        agent
    }

    /// 注册一个已构造的 Agent（同 id 覆盖），返回 id
    pub async fn register_agent(&self, agent: Agent) -> String {
        let id = agent.id.clone();
        tracing::info!(agent_id = %id, name = %agent.name, "agent registered");
        self.agents
            .write()
            .await
            .insert(id.clone(), Arc::new(RwLock::new(agent)));
        id
    }

    async fn agent_entry(&self, agent_id: &str) -> Result<Arc<RwLock<Agent>>, EngineError> {
        self.agents
            .read()
            .await
            .get(agent_id)
            .cloned()
            .ok_or_else(|| EngineError::AgentNotFound(agent_id.to_string()))
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<Agent, EngineError> {
        let entry = self.agent_entry(agent_id).await?;
        let agent = entry.read().await.clone();
        Ok(agent)
    }

    /// 全部 Agent 快照，按名称排序
    pub async fn list_agents(&self) -> Vec<Agent> {
        let entries: Vec<_> = self.agents.read().await.values().cloned().collect();
        let mut agents = Vec::with_capacity(entries.len());
        for entry in entries {
            agents.push(entry.read().await.clone());
        }
        agents.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        agents
    }

    /// Agent 的共享记忆句柄（与其工具看到的是同一份）
    pub async fn agent_memory(&self, agent_id: &str) -> Result<AgentMemory, EngineError> {
        Ok(self.agent_entry(agent_id).await?.read().await.memory.clone())
    }

    // ---------- Task ----------

    /// 为已存在的 Agent 创建 pending 任务
    pub async fn create_task(
        &self,
        agent_id: &str,
        title: impl Into<String>,
        description: impl Into<String>,
        input: Map<String, Value>,
    ) -> Result<Task, EngineError> {
        self.agent_entry(agent_id).await?;
        let task = Task::new(agent_id, title, description, input);
        let snapshot = task.clone();
        tracing::info!(task_id = %task.id, agent_id = %agent_id, "task created");
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), Arc::new(TaskEntry::new(task)));
        Ok(snapshot)
    }

    async fn task_entry(&self, task_id: &str) -> Result<Arc<TaskEntry>, EngineError> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task, EngineError> {
        let entry = self.task_entry(task_id).await?;
        let task = entry.task.read().await.clone();
        Ok(task)
    }

    /// 轻量轮询：只返回状态与进度
    pub async fn task_status(&self, task_id: &str) -> Result<(TaskStatus, f64), EngineError> {
        let entry = self.task_entry(task_id).await?;
        let task = entry.task.read().await;
        Ok((task.status, task.progress))
    }

    /// 任务快照，按创建时间排序；agent_id 为 Some 时只列出该 Agent 的任务
    pub async fn list_tasks(&self, agent_id: Option<&str>) -> Vec<Task> {
        let entries: Vec<_> = self.tasks.read().await.values().cloned().collect();
        let mut tasks = Vec::new();
        for entry in entries {
            let task = entry.task.read().await;
            if agent_id.map_or(true, |id| task.agent_id == id) {
                tasks.push(task.clone());
            }
        }
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// 执行任务直至终态，返回最终快照
    pub async fn execute_task(&self, task_id: &str) -> Result<Task, EngineError> {
        let entry = self.task_entry(task_id).await?;
        let agent_id = entry.task.read().await.agent_id.clone();
        let agent = self.agent_entry(&agent_id).await?;

        entry.task.write().await.start()?;
        entry.publish(TaskStatus::Running);
        self.emit(TaskEvent::TaskStarted {
            task_id: entry.id.clone(),
        });
        tracing::info!(task_id = %entry.id, agent_id = %agent_id, "task started");

        match self.run(&entry, &agent).await {
            Ok(()) => {}
            Err(EngineError::TaskFinalized(_)) if entry.cancel.is_cancelled() => {
                tracing::info!(task_id = %entry.id, "task stopped after cancellation");
                agent.write().await.state = AgentState::Idle;
            }
            Err(e) => {
                tracing::error!(task_id = %entry.id, "task aborted: {}", e);
                agent.write().await.state = AgentState::Error;
                return Err(e);
            }
        }

        let snapshot = entry.task.read().await.clone();
        Ok(snapshot)
    }

    /// 在后台执行任务，立即返回句柄
    pub fn spawn_task(
        self: &Arc<Self>,
        task_id: impl Into<String>,
    ) -> JoinHandle<Result<Task, EngineError>> {
        let this = Arc::clone(self);
        let task_id = task_id.into();
        tokio::spawn(async move { this.execute_task(&task_id).await })
    }

    /// 等待任务进入终态；超时返回 WaitTimeout，任务继续在后台运行
    pub async fn wait_for_task(&self, task_id: &str, timeout: Duration) -> Result<Task, EngineError> {
        let entry = self.task_entry(task_id).await?;
        let mut rx = entry.status_tx.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(|status| status.is_terminal()).await.map(|_| ())
        })
        .await;
        match waited {
            Ok(_) => {
                let snapshot = entry.task.read().await.clone();
                Ok(snapshot)
            }
            Err(_) => Err(EngineError::WaitTimeout {
                task_id: task_id.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// 取消运行中的任务；任务不在 running 状态时返回 Ok(false)
    pub async fn cancel_task(&self, task_id: &str) -> Result<bool, EngineError> {
        let entry = self.task_entry(task_id).await?;
        let cancelled = {
            let mut task = entry.task.write().await;
            let cancelled = task.cancel();
            // 持锁期间触发令牌：执行循环一旦看到终态，令牌必已取消
            if cancelled {
                entry.cancel.cancel();
            }
            cancelled
        };
        if cancelled {
            entry.publish(TaskStatus::Cancelled);
            self.emit(TaskEvent::TaskCancelled {
                task_id: entry.id.clone(),
            });
            tracing::info!(task_id = %entry.id, "task cancelled");
        }
        Ok(cancelled)
    }

    // ---------- 执行循环 ----------

    /// Agent 可见的工具名：白名单为空时为注册表全部工具
    fn visible_tools(&self, agent: &Agent) -> Vec<String> {
        if agent.tools.is_empty() {
            return self.tools.tool_names();
        }
        let mut names: Vec<String> = Vec::with_capacity(agent.tools.len());
        for tool in &agent.tools {
            if !names.contains(tool) {
                names.push(tool.clone());
            }
        }
        names
    }

    async fn set_agent_state(&self, agent: &RwLock<Agent>, state: AgentState) -> Agent {
        let mut guard = agent.write().await;
        guard.state = state;
        guard.clone()
    }

    /// 任务进入终态后的收尾：Agent 状态、状态广播与终态事件
    async fn finish(&self, entry: &TaskEntry, agent: &RwLock<Agent>, error: Option<String>) {
        let (status, state) = match error {
            None => (TaskStatus::Completed, AgentState::Completed),
            Some(_) => (TaskStatus::Failed, AgentState::Error),
        };
        agent.write().await.state = state;
        entry.publish(status);
        let task_id = entry.id.clone();
        match error {
            None => {
                tracing::info!(task_id = %task_id, "task completed");
                self.emit(TaskEvent::TaskCompleted { task_id });
            }
            Some(error) => {
                tracing::warn!(task_id = %task_id, "task failed: {}", error);
                self.emit(TaskEvent::TaskFailed { task_id, error });
            }
        }
    }

    async fn run(&self, entry: &TaskEntry, agent_lock: &RwLock<Agent>) -> Result<(), EngineError> {
        let agent = self.set_agent_state(agent_lock, AgentState::Thinking).await;
        let tool_names = self.visible_tools(&agent);
        let tool_schema = self.tools.registry().schema_json(&tool_names);

        let (prompt, reasoning_idx) = {
            let mut task = entry.task.write().await;
            let idx = task.push_step(Step::reasoning("Plan the task with the language model"))?;
            (
                build_reasoning_prompt(&agent, &task, &tool_names, &tool_schema),
                idx,
            )
        };
        self.emit(TaskEvent::Thinking {
            task_id: entry.id.clone(),
        });

        let raw = match self.reasoner.reason(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                let msg = EngineError::Reasoning(e).to_string();
                {
                    let mut task = entry.task.write().await;
                    task.fail_step(reasoning_idx, msg.clone(), None)?;
                    task.fail(msg.clone())?;
                }
                self.finish(entry, agent_lock, Some(msg)).await;
                return Ok(());
            }
        };
        entry.check_cancelled()?;

        let (plan, parse_error) = self.parser.parse_detailed(&raw);
        let reasoning_output = plan.to_reasoning_output();
        entry
            .task
            .write()
            .await
            .complete_step(reasoning_idx, reasoning_output.clone())?;
        self.emit(TaskEvent::PlanParsed {
            task_id: entry.id.clone(),
            steps: plan.len(),
            fallback: parse_error.is_some(),
        });
        tracing::debug!(task_id = %entry.id, steps = plan.len(), "plan parsed");

        let agent = self.set_agent_state(agent_lock, AgentState::Acting).await;

        if plan.is_empty() {
            entry.task.write().await.complete(Some(reasoning_output))?;
            self.finish(entry, agent_lock, None).await;
            return Ok(());
        }

        let total = plan.len();
        for (i, action) in plan.steps.iter().enumerate() {
            entry.check_cancelled()?;

            let prior = entry.task.read().await.steps.clone();
            let resolved = self.resolver.resolve(action, &prior);
            let idx = entry.task.write().await.push_step(Step::started(
                resolved.name.clone(),
                resolved.description.clone(),
                resolved.input.clone(),
            ))?;
            self.emit(TaskEvent::StepStarted {
                task_id: entry.id.clone(),
                index: idx,
                name: resolved.name.clone(),
                tool: resolved.tool.clone(),
            });

            let outcome = match self.step_executor.execute(&resolved, &agent).await {
                Ok(output) => Ok(output),
                Err(failure) => self.try_recover(entry, idx, &resolved, failure, &agent).await?,
            };

            match outcome {
                Ok(output) => {
                    let last = i + 1 == total;
                    let progress = {
                        let mut task = entry.task.write().await;
                        task.complete_step(idx, output.clone())?;
                        if last {
                            task.complete(Some(output))?;
                        } else {
                            task.advance_progress((i + 1) as f64 / total as f64)?;
                        }
                        task.progress
                    };
                    self.emit(TaskEvent::StepCompleted {
                        task_id: entry.id.clone(),
                        index: idx,
                        progress,
                    });
                    if last {
                        self.finish(entry, agent_lock, None).await;
                    }
                }
                Err(failure) => {
                    let msg = failure.error.to_string();
                    {
                        let mut task = entry.task.write().await;
                        task.fail_step(idx, msg.clone(), Some(failure.output))?;
                        task.fail(msg.clone())?;
                    }
                    self.emit(TaskEvent::StepFailed {
                        task_id: entry.id.clone(),
                        index: idx,
                        error: msg.clone(),
                    });
                    self.finish(entry, agent_lock, Some(msg)).await;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// 对失败步骤至多尝试一次恢复；外层 Err 只表示任务已被取消
    async fn try_recover(
        &self,
        entry: &TaskEntry,
        idx: usize,
        failed: &Action,
        failure: StepFailure,
        agent: &Agent,
    ) -> Result<Result<Value, StepFailure>, EngineError> {
        if !self.recovery.should_recover(&failure.error) {
            return Ok(Err(failure));
        }
        tracing::warn!(
            task_id = %entry.id,
            tool = %failed.tool,
            "step failed ({}), attempting recovery",
            failure.error
        );

        let corrected = match self.recovery.recover(failed, &failure.error).await {
            Ok(action) => action,
            Err(e) => {
                entry.check_cancelled()?;
                self.emit(TaskEvent::RecoveryAttempted {
                    task_id: entry.id.clone(),
                    index: idx,
                    tool: failed.tool.clone(),
                    succeeded: false,
                });
                let reason = match e {
                    EngineError::Recovery(reason) => reason,
                    other => other.to_string(),
                };
                return Ok(Err(StepFailure {
                    output: failure.output,
                    error: EngineError::Recovery(format!(
                        "{reason} (original error: {})",
                        failure.error
                    )),
                }));
            }
        };
        entry.check_cancelled()?;

        let prior = entry.task.read().await.steps.clone();
        let corrected = self.resolver.resolve(&corrected, &prior);
        let result = self.step_executor.execute(&corrected, agent).await;
        self.emit(TaskEvent::RecoveryAttempted {
            task_id: entry.id.clone(),
            index: idx,
            tool: corrected.tool.clone(),
            succeeded: result.is_ok(),
        });

        Ok(result.map(|mut output| {
            if let Value::Object(map) = &mut output {
                map.insert(
                    "recovered_from".to_string(),
                    Value::String(failed.tool.clone()),
                );
            }
            output
        }))
    }
}
