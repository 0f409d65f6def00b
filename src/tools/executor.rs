//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args, memory) 在超时内调用 registry.call，
//! 超时转为 ToolTimeout；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::EngineError;
use crate::memory::AgentMemory;
use crate::tools::ToolRegistry;

/// 工具执行器：对每次调用施加超时，并将结果映射为 EngineError
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self::with_timeout(registry, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// 执行指定工具；超时返回 ToolTimeout，其余错误原样返回；输出 JSON 审计日志
    pub async fn execute(
        &self,
        tool_name: &str,
        args: Value,
        memory: &AgentMemory,
    ) -> Result<Value, EngineError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.call(tool_name, args, memory)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(inner) => inner,
            Err(_) => Err(EngineError::ToolTimeout(tool_name.to_string())),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
