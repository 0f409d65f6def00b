//! 记忆工具：memory_get / memory_set，读写所属 Agent 的共享键值记忆

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::memory::AgentMemory;
use crate::tools::Tool;

fn key_arg(args: &Value) -> Result<&str, String> {
    args.get("key")
        .and_then(|v| v.as_str())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| "missing parameter 'key'".to_string())
}

/// 读取键；不存在时返回 null（不视为错误）
pub struct MemoryGetTool;

#[async_trait]
impl Tool for MemoryGetTool {
    fn name(&self) -> &str {
        "memory_get"
    }

    fn description(&self) -> &str {
        "Read a value from the agent's memory. Args: {\"key\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "key": { "type": "string" } },
            "required": ["key"]
        })
    }

    async fn execute(&self, args: Value, memory: &AgentMemory) -> Result<Value, String> {
        let key = key_arg(&args)?;
        Ok(memory.get(key).await.unwrap_or(Value::Null))
    }
}

/// 写入键，返回写入的值
pub struct MemorySetTool;

#[async_trait]
impl Tool for MemorySetTool {
    fn name(&self) -> &str {
        "memory_set"
    }

    fn description(&self) -> &str {
        "Store a value in the agent's memory. Args: {\"key\": \"...\", \"value\": any}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "key": { "type": "string" }, "value": {} },
            "required": ["key", "value"]
        })
    }

    async fn execute(&self, args: Value, memory: &AgentMemory) -> Result<Value, String> {
        let key = key_arg(&args)?.to_string();
        let value = args
            .get("value")
            .cloned()
            .ok_or_else(|| "missing parameter 'value'".to_string())?;
        memory.set(key, value.clone()).await;
        Ok(value)
    }
}
