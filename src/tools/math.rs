//! 算术工具：add / multiply
//!
//! 参数 a、b 接受数字或数字字符串；两者均为整数时返回整数，否则返回浮点数。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::memory::AgentMemory;
use crate::tools::Tool;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

fn number_arg(args: &Value, key: &str) -> Result<Number, String> {
    let value = args
        .get(key)
        .ok_or_else(|| format!("missing parameter '{key}'"))?;
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .map(Number::Int)
            .or_else(|| n.as_f64().map(Number::Float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Number::Int)
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(Number::Float))
        }
        _ => None,
    };
    parsed.ok_or_else(|| format!("parameter '{key}' must be a number, got {value}"))
}

fn float_value(f: f64) -> Result<Value, String> {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("result {f} is not a finite number"))
}

fn apply(
    args: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, String> {
    let a = number_arg(args, "a")?;
    let b = number_arg(args, "b")?;
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => match int_op(x, y) {
            Some(r) => Ok(json!(r)),
            None => float_value(float_op(x as f64, y as f64)),
        },
        _ => float_value(float_op(a.as_f64(), b.as_f64())),
    }
}

/// 加法：{"a": 2, "b": 3} → 5
pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two numbers. Args: {\"a\": number, \"b\": number}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
            "required": ["a", "b"]
        })
    }

    async fn execute(&self, args: Value, _memory: &AgentMemory) -> Result<Value, String> {
        apply(&args, i64::checked_add, |x, y| x + y)
    }
}

/// 乘法：{"a": 3, "b": 15} → 45
pub struct MultiplyTool;

#[async_trait]
impl Tool for MultiplyTool {
    fn name(&self) -> &str {
        "multiply"
    }

    fn description(&self) -> &str {
        "Multiply two numbers. Args: {\"a\": number, \"b\": number}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
            "required": ["a", "b"]
        })
    }

    async fn execute(&self, args: Value, _memory: &AgentMemory) -> Result<Value, String> {
        apply(&args, i64::checked_mul, |x, y| x * y)
    }
}
