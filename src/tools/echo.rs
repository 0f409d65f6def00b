//! Echo 工具：回显文本；也是解析失败时兜底计划使用的安全工具

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::memory::AgentMemory;
use crate::tools::Tool;

/// Echo 工具：回显文本
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back unchanged. Args: {\"text\": \"message\"}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": []
        })
    }

    async fn execute(&self, args: Value, _memory: &AgentMemory) -> Result<Value, String> {
        let text = args
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("(empty)");
        Ok(Value::String(text.to_string()))
    }
}
