//! 引擎集成测试：从推理回复到任务终态的完整流程

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use taskbee::core::{EngineError, TaskEvent, TaskOrchestrator};
    use taskbee::llm::MockReasoner;
    use taskbee::memory::AgentMemory;
    use taskbee::task::{AgentState, TaskStatus, REASONING_STEP_NAME};
    use taskbee::tools::{Tool, ToolRegistry};
    use tokio::sync::mpsc;

    const MULTIPLY_PLAN: &str = r#"{"analysis": "multiply", "steps": [{"name": "mul", "description": "3 * 15", "tool": "multiply", "input": {"a": 3, "b": 15}}], "reasoning": "one step"}"#;

    /// 总是以参数错误失败的工具，记录调用次数
    struct FlakyTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "Always rejects its input"
        }

        async fn execute(&self, _args: Value, _memory: &AgentMemory) -> Result<Value, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("parameter 'x' is invalid".to_string())
        }
    }

    fn setup(mock: MockReasoner) -> (Arc<MockReasoner>, Arc<TaskOrchestrator>) {
        setup_with_registry(mock, ToolRegistry::with_builtins())
    }

    fn setup_with_registry(
        mock: MockReasoner,
        registry: ToolRegistry,
    ) -> (Arc<MockReasoner>, Arc<TaskOrchestrator>) {
        let mock = Arc::new(mock);
        let orch = TaskOrchestrator::new(mock.clone(), Arc::new(registry));
        (mock, Arc::new(orch))
    }

    async fn new_task(orch: &TaskOrchestrator, tools: Vec<String>) -> (String, String) {
        let agent = orch
            .create_agent("calc", "Arithmetic agent", "You are a calculator", tools)
            .await;
        let task = orch
            .create_task(&agent.id, "Compute", "Do some arithmetic", Map::new())
            .await
            .unwrap();
        (agent.id, task.id)
    }

    #[tokio::test]
    async fn test_single_step_completes() {
        let (_, orch) = setup(MockReasoner::new().with_response(MULTIPLY_PLAN));
        let (agent_id, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 1.0);
        assert!(task.error.is_none());
        assert!(task.completed_at.is_some());

        let reasoning = &task.steps[0];
        assert_eq!(reasoning.name, REASONING_STEP_NAME);
        assert_eq!(reasoning.status, TaskStatus::Completed);
        assert_eq!(reasoning.output.as_ref().unwrap()["analysis"], "multiply");

        let step = &task.steps[1];
        assert_eq!(step.name, "mul");
        assert_eq!(step.status, TaskStatus::Completed);
        let output = step.output.as_ref().unwrap();
        assert_eq!(output["result"], json!(45));
        assert_eq!(output["success"], json!(true));
        assert_eq!(output["action"], "multiply");

        let agent = orch.get_agent(&agent_id).await.unwrap();
        assert_eq!(agent.state, AgentState::Completed);
    }

    #[tokio::test]
    async fn test_chained_steps_resolve_references() {
        let plan = r#"{"steps": [
            {"name": "sum", "tool": "add", "input": {"a": 2, "b": 3}},
            {"name": "scale", "tool": "multiply", "input": {"a": "result of step 1", "b": 4}}
        ]}"#;
        let (_, orch) = setup(MockReasoner::new().with_response(plan));
        let (_, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.steps.len(), 3);

        let scale = &task.steps[2];
        assert_eq!(scale.input["a"], json!(5));
        assert_eq!(scale.input["b"], json!(4));
        assert_eq!(scale.output.as_ref().unwrap()["result"], json!(20));
        assert_eq!(task.output.as_ref().unwrap()["result"], json!(20));
    }

    #[tokio::test]
    async fn test_action_named_llm_reasoning_is_referenceable() {
        let plan = r#"{"steps": [
            {"name": "llm_reasoning", "tool": "add", "input": {"a": 2, "b": 3}},
            {"tool": "multiply", "input": {"a": "result of step 1", "b": 4}}
        ]}"#;
        let (_, orch) = setup(MockReasoner::new().with_response(plan));
        let (_, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.steps[0].is_reasoning());
        assert!(!task.steps[1].is_reasoning());
        assert_eq!(task.steps[2].input["a"], json!(5));
        assert_eq!(task.output.as_ref().unwrap()["result"], json!(20));
    }

    #[tokio::test]
    async fn test_previous_result_reference() {
        let plan = r#"{"steps": [
            {"tool": "uppercase", "input": {"text": "hello world"}},
            {"tool": "reverse", "input": {"text": "previous result"}}
        ]}"#;
        let (_, orch) = setup(MockReasoner::new().with_response(plan));
        let (_, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.output.as_ref().unwrap()["result"], json!("DLROW OLLEH"));
    }

    #[tokio::test]
    async fn test_malformed_response_uses_fallback() {
        let (_, orch) = setup(
            MockReasoner::new().with_response(r#"Plan: {"steps": [{"tool": "add", "input": {"a": 1"#),
        );
        let (_, task_id) = new_task(&orch, vec!["add".into()]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.steps.len(), 2);
        assert_eq!(task.steps[1].name, "fallback");
        let output = task.steps[1].output.as_ref().unwrap();
        assert_eq!(output["action"], "echo");
        assert!(output["result"].as_str().unwrap().starts_with("Plan:"));
        assert_eq!(task.steps[0].output.as_ref().unwrap()["reasoning"], "fallback");
    }

    #[tokio::test]
    async fn test_prose_response_reaches_terminal_state() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mock = Arc::new(MockReasoner::new().with_response("I would multiply the numbers."));
        let orch = TaskOrchestrator::new(mock, Arc::new(ToolRegistry::with_builtins()))
            .with_event_sender(tx);
        let (_, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.steps[0].output.as_ref().unwrap()["analysis"]
            .as_str()
            .unwrap()
            .contains("plain prose"));

        let mut fallback = None;
        while let Ok(event) = rx.try_recv() {
            if let TaskEvent::PlanParsed { fallback: f, .. } = event {
                fallback = Some(f);
            }
        }
        assert_eq!(fallback, Some(true));
    }

    #[tokio::test]
    async fn test_empty_plan_completes() {
        let (_, orch) = setup(
            MockReasoner::new().with_response(r#"{"analysis": "nothing to do", "steps": []}"#),
        );
        let (_, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 1.0);
        assert_eq!(task.steps.len(), 1);
        assert_eq!(task.output.as_ref().unwrap()["analysis"], "nothing to do");
    }

    #[tokio::test]
    async fn test_reasoning_failure_fails_task() {
        let (_, orch) = setup(MockReasoner::new().with_error("service unavailable"));
        let (agent_id, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.progress, 0.0);
        assert_eq!(task.steps.len(), 1);
        assert_eq!(task.steps[0].status, TaskStatus::Failed);
        assert!(task.error.as_ref().unwrap().contains("service unavailable"));

        let agent = orch.get_agent(&agent_id).await.unwrap();
        assert_eq!(agent.state, AgentState::Error);
    }

    #[tokio::test]
    async fn test_recovery_is_bounded_to_one_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ToolRegistry::with_builtins();
        registry.register(FlakyTool {
            calls: calls.clone(),
        });
        let plan = r#"{"steps": [
            {"tool": "add", "input": {"a": 1, "b": 1}},
            {"tool": "flaky", "input": {"x": 1}}
        ]}"#;
        let retry = r#"{"steps": [{"tool": "flaky", "input": {"x": 2}}]}"#;
        let (mock, orch) = setup_with_registry(
            MockReasoner::new().with_response(plan).with_response(retry),
            registry,
        );
        let (_, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(mock.call_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(task.progress, 0.5);
        assert_eq!(task.steps.len(), 3);
        assert_eq!(task.steps[2].status, TaskStatus::Failed);
        assert!(task.error.as_ref().unwrap().contains("parameter 'x' is invalid"));
        assert!(mock.prompts()[1].contains("Tool: flaky"));
    }

    #[tokio::test]
    async fn test_successful_recovery_completes_step() {
        let plan = r#"{"steps": [{"tool": "multiply", "input": {"a": "three", "b": 15}}]}"#;
        let fixed = r#"{"steps": [{"tool": "multiply", "input": {"a": 3, "b": 15}}]}"#;
        let (mock, orch) = setup(MockReasoner::new().with_response(plan).with_response(fixed));
        let (_, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(mock.call_count(), 2);
        assert_eq!(task.steps.len(), 2);
        let output = task.steps[1].output.as_ref().unwrap();
        assert_eq!(output["result"], json!(45));
        assert_eq!(output["recovered_from"], "multiply");
        assert!(mock.prompts()[1].contains("must be a number"));
    }

    #[tokio::test]
    async fn test_unparseable_recovery_fails_task() {
        let plan = r#"{"steps": [{"tool": "multiply", "input": {"a": 3}}]}"#;
        let (mock, orch) =
            setup(MockReasoner::new().with_response(plan).with_response("I give up."));
        let (_, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(mock.call_count(), 2);
        let error = task.error.unwrap();
        assert!(error.contains("Recovery failed"));
        assert!(error.contains("missing parameter 'b'"));
    }

    #[tokio::test]
    async fn test_tool_not_permitted() {
        let (_, orch) = setup(MockReasoner::new().with_response(MULTIPLY_PLAN));
        let (_, task_id) = new_task(&orch, vec!["add".into()]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_ref().unwrap().contains("not permitted"));
        assert_eq!(task.steps[1].status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_progress_events_are_monotonic() {
        let plan = r#"{"steps": [
            {"tool": "add", "input": {"a": 1, "b": 2}},
            {"tool": "multiply", "input": {"a": "result of step 1", "b": 3}},
            {"tool": "add", "input": {"a": "previous result", "b": 1}}
        ]}"#;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mock = Arc::new(MockReasoner::new().with_response(plan));
        let orch = TaskOrchestrator::new(mock, Arc::new(ToolRegistry::with_builtins()))
            .with_event_sender(tx);
        let (_, task_id) = new_task(&orch, vec![]).await;

        let task = orch.execute_task(&task_id).await.unwrap();
        assert_eq!(task.output.as_ref().unwrap()["result"], json!(10));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(TaskEvent::TaskStarted { .. })));
        assert!(matches!(events.last(), Some(TaskEvent::TaskCompleted { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            TaskEvent::PlanParsed { steps: 3, fallback: false, .. }
        )));

        let progress: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::StepCompleted { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 3);
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(progress[2], 1.0);
    }

    #[tokio::test]
    async fn test_wait_timeout_is_not_failure() {
        let (_, orch) = setup(
            MockReasoner::new()
                .with_response(MULTIPLY_PLAN)
                .with_delay(Duration::from_millis(300)),
        );
        let (_, task_id) = new_task(&orch, vec![]).await;
        let handle = orch.spawn_task(task_id.clone());

        let err = orch
            .wait_for_task(&task_id, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::WaitTimeout { .. }));
        assert!(!orch.get_task(&task_id).await.unwrap().is_terminal());

        let task = orch
            .wait_for_task(&task_id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancel_running_task() {
        let (_, orch) = setup(
            MockReasoner::new()
                .with_response(MULTIPLY_PLAN)
                .with_delay(Duration::from_millis(200)),
        );
        let (agent_id, task_id) = new_task(&orch, vec![]).await;
        let handle = orch.spawn_task(task_id.clone());

        while orch.task_status(&task_id).await.unwrap().0 != TaskStatus::Running {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(orch.cancel_task(&task_id).await.unwrap());
        assert!(!orch.cancel_task(&task_id).await.unwrap());

        let task = handle.await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(task.steps.len(), 1);
        assert_eq!(task.steps[0].status, TaskStatus::Running);

        let agent = orch.get_agent(&agent_id).await.unwrap();
        assert_eq!(agent.state, AgentState::Idle);
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let (_, orch) = setup(MockReasoner::new());
        assert_eq!(
            orch.get_task("task_missing").await.unwrap_err(),
            EngineError::TaskNotFound("task_missing".into())
        );
        assert!(matches!(
            orch.execute_task("task_missing").await,
            Err(EngineError::TaskNotFound(_))
        ));
        assert!(matches!(
            orch.cancel_task("task_missing").await,
            Err(EngineError::TaskNotFound(_))
        ));
        assert!(matches!(
            orch.wait_for_task("task_missing", Duration::from_millis(10)).await,
            Err(EngineError::TaskNotFound(_))
        ));
        assert!(matches!(
            orch.get_agent("agent_missing").await,
            Err(EngineError::AgentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_tasks() {
        let (_, orch) = setup(MockReasoner::new().with_default(MULTIPLY_PLAN));
        let agent = orch.create_agent("calc", "", "", vec![]).await;

        let mut ids = Vec::new();
        for i in 0..5 {
            let task = orch
                .create_task(&agent.id, format!("task {i}"), "", Map::new())
                .await
                .unwrap();
            ids.push(task.id);
        }
        let handles: Vec<_> = ids.iter().map(|id| orch.spawn_task(id.clone())).collect();
        let results = futures_util::future::join_all(handles).await;

        for result in results {
            let task = result.unwrap().unwrap();
            assert_eq!(task.status, TaskStatus::Completed);
            assert_eq!(task.output.as_ref().unwrap()["result"], json!(45));
        }
        assert_eq!(orch.list_tasks(Some(&agent.id)).await.len(), 5);
    }

    #[tokio::test]
    async fn test_memory_shared_across_tasks() {
        let store = r#"{"steps": [{"tool": "memory_set", "input": {"key": "total", "value": 45}}]}"#;
        let load = r#"{"steps": [{"tool": "memory_get", "input": {"key": "total"}}]}"#;
        let (_, orch) = setup(MockReasoner::new().with_response(store).with_response(load));
        let agent = orch.create_agent("notes", "", "", vec![]).await;

        let first = orch.create_task(&agent.id, "store", "", Map::new()).await.unwrap();
        orch.execute_task(&first.id).await.unwrap();
        let second = orch.create_task(&agent.id, "load", "", Map::new()).await.unwrap();
        let task = orch.execute_task(&second.id).await.unwrap();

        assert_eq!(task.output.as_ref().unwrap()["result"], json!(45));
        let memory = orch.agent_memory(&agent.id).await.unwrap();
        assert_eq!(memory.get("total").await, Some(json!(45)));
    }
}
