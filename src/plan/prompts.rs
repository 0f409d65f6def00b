//! Prompt 构造：主规划 prompt 与恢复 prompt
//!
//! 两者都要求模型只输出一个 JSON 对象，格式与 PlanParser 期望的一致。

use serde_json::{Map, Value};

use crate::plan::Action;
use crate::task::{Agent, Task};

const PLAN_FORMAT: &str = r#"Respond with a single JSON object and nothing else:
{
  "analysis": "short analysis of the task",
  "steps": [
    {"name": "step name", "description": "what it does", "tool": "tool_name", "input": {"param": "value"}}
  ],
  "reasoning": "why these steps"
}
To use the result of an earlier step as a parameter, write the value as "result of step N" (N starts at 1) or "previous result"."#;

fn input_json(input: &Map<String, Value>) -> String {
    serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string())
}

/// 主规划 prompt：Agent 系统提示词 + 任务标题/描述/输入 + 可用工具（逗号分隔）+ 工具参数说明
pub fn build_reasoning_prompt(
    agent: &Agent,
    task: &Task,
    tool_names: &[String],
    tool_schema: &str,
) -> String {
    let mut prompt = String::new();
    if !agent.system_prompt.trim().is_empty() {
        prompt.push_str(agent.system_prompt.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!("## Task\n{}\n\n", task.title));
    if !task.description.trim().is_empty() {
        prompt.push_str(&format!("## Description\n{}\n\n", task.description.trim()));
    }
    prompt.push_str(&format!("## Input\n{}\n\n", input_json(&task.input)));
    prompt.push_str(&format!("## Available tools\n{}\n\n", tool_names.join(", ")));
    if !tool_schema.trim().is_empty() {
        prompt.push_str(&format!("## Tool parameters\n{}\n\n", tool_schema.trim()));
    }
    prompt.push_str(PLAN_FORMAT);
    prompt
}

/// 恢复 prompt：嵌入失败动作的 name / tool / input / error，要求给出一个修正后的步骤
pub fn build_recovery_prompt(action: &Action, error: &str) -> String {
    format!(
        "A step of a plan failed.\n\
         Step: {name}\n\
         Tool: {tool}\n\
         Input: {input}\n\
         Error: {error}\n\n\
         Propose exactly one corrected step that achieves the same goal.\n{format}",
        name = action.name,
        tool = action.tool,
        input = input_json(&action.input),
        error = error,
        format = PLAN_FORMAT,
    )
}
