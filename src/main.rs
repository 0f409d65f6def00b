//! TaskBee 演示入口
//!
//! 加载配置、初始化日志，用脚本化的 Mock 推理回调跑一个两步任务（add → multiply，
//! 第二步引用第一步的结果），并打印执行事件与最终任务 JSON。

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use taskbee::config::load_config;
use taskbee::{observability, MockReasoner, TaskOrchestrator, ToolRegistry};
use tokio::sync::mpsc;

const DEMO_PLAN: &str = r#"<think>Add first, then scale the sum.</think>
```json
{
  "analysis": "Compute (2 + 3) * 4",
  "steps": [
    {"name": "sum", "description": "Add the inputs", "tool": "add", "input": {"a": 2, "b": 3}},
    {"name": "scale", "description": "Multiply the sum", "tool": "multiply", "input": {"a": "result of step 1", "b": 4}}
  ],
  "reasoning": "The product depends on the sum"
}
```"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Default::default()
    });

    let reasoner = Arc::new(MockReasoner::new().with_response(DEMO_PLAN));
    let registry = Arc::new(ToolRegistry::with_builtins());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let orchestrator = Arc::new(
        TaskOrchestrator::from_config(reasoner, registry, &cfg).with_event_sender(event_tx),
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let terminal = event.is_terminal();
            println!("{}", serde_json::to_string(&event).unwrap_or_default());
            if terminal {
                break;
            }
        }
    });

    let agent = orchestrator
        .create_agent(
            "calculator",
            "Does arithmetic with tools",
            "You are a careful calculator. Use tools for every operation.",
            vec!["add".into(), "multiply".into()],
        )
        .await;
    let input = json!({"a": 2, "b": 3, "factor": 4});
    let task = orchestrator
        .create_task(
            &agent.id,
            "Compute (2 + 3) * 4",
            "Add a and b, then multiply by factor",
            input.as_object().cloned().unwrap_or_default(),
        )
        .await
        .context("Failed to create task")?;

    let done = orchestrator
        .execute_task(&task.id)
        .await
        .context("Task execution failed")?;
    let _ = printer.await;

    println!(
        "{}",
        serde_json::to_string_pretty(&done).context("Failed to serialize task")?
    );
    Ok(())
}
