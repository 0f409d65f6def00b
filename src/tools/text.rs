//! 文本变换工具：uppercase / lowercase / reverse / word_count

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::memory::AgentMemory;
use crate::tools::Tool;

fn text_arg(args: &Value) -> Result<&str, String> {
    match args.get("text") {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(format!("parameter 'text' must be a string, got {other}")),
        None => Err("missing parameter 'text'".to_string()),
    }
}

fn text_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "text": { "type": "string" } },
        "required": ["text"]
    })
}

pub struct UppercaseTool;

#[async_trait]
impl Tool for UppercaseTool {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn description(&self) -> &str {
        "Convert text to upper case. Args: {\"text\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        text_schema()
    }

    async fn execute(&self, args: Value, _memory: &AgentMemory) -> Result<Value, String> {
        Ok(json!(text_arg(&args)?.to_uppercase()))
    }
}

pub struct LowercaseTool;

#[async_trait]
impl Tool for LowercaseTool {
    fn name(&self) -> &str {
        "lowercase"
    }

    fn description(&self) -> &str {
        "Convert text to lower case. Args: {\"text\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        text_schema()
    }

    async fn execute(&self, args: Value, _memory: &AgentMemory) -> Result<Value, String> {
        Ok(json!(text_arg(&args)?.to_lowercase()))
    }
}

pub struct ReverseTool;

#[async_trait]
impl Tool for ReverseTool {
    fn name(&self) -> &str {
        "reverse"
    }

    fn description(&self) -> &str {
        "Reverse the characters of text. Args: {\"text\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        text_schema()
    }

    async fn execute(&self, args: Value, _memory: &AgentMemory) -> Result<Value, String> {
        Ok(json!(text_arg(&args)?.chars().rev().collect::<String>()))
    }
}

/// 按空白分词计数
pub struct WordCountTool;

#[async_trait]
impl Tool for WordCountTool {
    fn name(&self) -> &str {
        "word_count"
    }

    fn description(&self) -> &str {
        "Count whitespace-separated words. Args: {\"text\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        text_schema()
    }

    async fn execute(&self, args: Value, _memory: &AgentMemory) -> Result<Value, String> {
        Ok(json!(text_arg(&args)?.split_whitespace().count()))
    }
}
