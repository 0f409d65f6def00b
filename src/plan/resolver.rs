//! 依赖解析：把参数中的自然语言回溯引用替换为前序步骤的实际结果
//!
//! 支持的引用（大小写不敏感，整串匹配）：
//! - `result of step N` / `output from step N` / `the result of step N`
//! - `step N result` / `step N's output`
//! - `previous result` / `last result` / `previous step output` 等，指最近一个工具步骤
//!
//! N 为 1 起始的任意序号，只统计实际执行了工具的已完成步骤（推理步骤不计入）。
//! 旧实现只认识固定的三种写法（最多到 step 3），这里按正则捕获任意序号，属于有意的行为变化。
//! 序号越界或输出中没有 result 时保留原字符串，后续工具调用会自然失败并走正常的步骤错误流程。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::plan::Action;
use crate::task::{Step, TaskStatus};

static RESULT_OF_STEP_RE: OnceLock<Regex> = OnceLock::new();
static STEP_RESULT_RE: OnceLock<Regex> = OnceLock::new();
static PREVIOUS_RESULT_RE: OnceLock<Regex> = OnceLock::new();

/// 解析出的回溯引用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepReference {
    /// 0 起始的工具步骤下标
    Index(usize),
    /// 最近一个工具步骤
    Previous,
}

/// 识别字符串是否为回溯引用
pub fn parse_reference(text: &str) -> Option<StepReference> {
    let text = text.trim();
    let result_of_step = RESULT_OF_STEP_RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:the\s+)?(?:result|output)\s+(?:of|from)\s+step\s*#?(\d+)$").unwrap()
    });
    let step_result = STEP_RESULT_RE.get_or_init(|| {
        Regex::new(r"(?i)^step\s*#?(\d+)(?:'s)?\s+(?:result|output)$").unwrap()
    });
    let previous = PREVIOUS_RESULT_RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:the\s+)?(?:previous|last|prior)\s+(?:step\s+)?(?:result|output)$")
            .unwrap()
    });

    if previous.is_match(text) {
        return Some(StepReference::Previous);
    }
    let caps = result_of_step
        .captures(text)
        .or_else(|| step_result.captures(text))?;
    let n: usize = caps.get(1)?.as_str().parse().ok()?;
    n.checked_sub(1).map(StepReference::Index)
}

/// 从步骤输出中取结果：优先 output.result，其次 result；null 视为无结果
pub fn extract_result(output: &Value) -> Option<Value> {
    output
        .get("output")
        .and_then(|o| o.get("result"))
        .filter(|v| !v.is_null())
        .or_else(|| output.get("result").filter(|v| !v.is_null()))
        .cloned()
}

/// 依赖解析器（纯函数，不会失败）
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// 返回替换后的新 Action；非字符串参数原样保留
    pub fn resolve(&self, action: &Action, prior_steps: &[Step]) -> Action {
        let completed: Vec<&Step> = prior_steps
            .iter()
            .filter(|s| !s.is_reasoning() && s.status == TaskStatus::Completed)
            .collect();

        let mut resolved = action.clone();
        for (key, value) in resolved.input.iter_mut() {
            let Value::String(text) = value else { continue };
            let Some(reference) = parse_reference(text) else { continue };
            let target = match reference {
                StepReference::Index(i) => completed.get(i),
                StepReference::Previous => completed.last(),
            };
            match target.and_then(|s| s.output.as_ref()).and_then(extract_result) {
                Some(result) => {
                    tracing::debug!(param = %key, reference = %text, "resolved step reference");
                    *value = result;
                }
                None => {
                    tracing::debug!(param = %key, reference = %text, "step reference left unresolved");
                }
            }
        }
        resolved
    }
}
