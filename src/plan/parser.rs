//! Plan 解析器：把不可信的模型输出转成结构化 Plan
//!
//! parse 永不失败：任何一步出错（无 `{`、扫描未闭合、反序列化失败）都会生成兜底计划，
//! 由单个安全工具步骤组成（默认 echo 回显响应预览），保证编排器总能拿到一个计划。
//! try_parse 暴露失败原因，供恢复规划区分「解析失败」与「解析成功」。

use thiserror::Error;

use crate::config::EngineSection;
use crate::plan::extract::{locate_json_object, strip_code_fences, strip_thinking, truncate_chars};
use crate::plan::{Action, Plan};

/// 兜底步骤回显的响应预览上限（字符）
const FALLBACK_PREVIEW_CHARS: usize = 500;

/// 计划解析失败原因（只在 try_parse 中暴露）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty response")]
    Empty,

    #[error("no JSON object found")]
    NoJsonObject,

    #[error("JSON object not closed within {scanned} chars")]
    Unterminated { scanned: usize },

    #[error("invalid plan JSON: {0}")]
    Invalid(String),
}

/// 兜底时对原始文本的粗略判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Empty,
    Html,
    Code,
    MalformedJson,
    Prose,
}

impl ResponseKind {
    /// 启发式识别模型似乎在输出什么
    pub fn detect(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        let lower = trimmed.to_lowercase();
        if lower.contains("<html") || lower.contains("<!doctype") || lower.contains("<div") {
            Self::Html
        } else if trimmed.contains("```")
            || ["fn ", "def ", "function ", "class ", "#include"]
                .iter()
                .any(|k| trimmed.contains(k))
        {
            Self::Code
        } else if trimmed.contains('{') {
            Self::MalformedJson
        } else {
            Self::Prose
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Empty => "an empty response",
            Self::Html => "an HTML document",
            Self::Code => "source code",
            Self::MalformedJson => "malformed JSON",
            Self::Prose => "plain prose",
        }
    }
}

/// Plan 解析器：持有响应长度上限、思考标记与兜底工具名
#[derive(Debug, Clone)]
pub struct PlanParser {
    max_response_chars: usize,
    thinking_start: String,
    thinking_end: String,
    fallback_tool: String,
}

impl Default for PlanParser {
    fn default() -> Self {
        Self::from_config(&EngineSection::default())
    }
}

impl PlanParser {
    pub fn from_config(config: &EngineSection) -> Self {
        Self {
            max_response_chars: config.max_response_chars,
            thinking_start: config.thinking_start.clone(),
            thinking_end: config.thinking_end.clone(),
            fallback_tool: config.fallback_tool.clone(),
        }
    }

    pub fn fallback_tool(&self) -> &str {
        &self.fallback_tool
    }

    /// 去掉思考标记与代码块标记
    pub fn clean(&self, raw: &str) -> String {
        let without_thinking = strip_thinking(raw, &self.thinking_start, &self.thinking_end);
        strip_code_fences(&without_thinking).into_owned()
    }

    /// 严格解析：失败返回原因
    pub fn try_parse(&self, raw: &str) -> Result<Plan, ParseError> {
        if raw.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let cleaned = self.clean(raw);
        let json = locate_json_object(&cleaned, self.max_response_chars)?;
        let mut plan: Plan =
            serde_json::from_str(json).map_err(|e| ParseError::Invalid(e.to_string()))?;
        for (i, action) in plan.steps.iter_mut().enumerate() {
            action.tool = action.tool.trim().to_string();
            if action.tool.is_empty() {
                return Err(ParseError::Invalid(format!("step {} has no tool", i + 1)));
            }
            if action.name.trim().is_empty() {
                action.name = action.tool.clone();
            }
        }
        Ok(plan)
    }

    /// 宽松解析：失败时返回兜底计划，并附带失败原因
    pub fn parse_detailed(&self, raw: &str) -> (Plan, Option<ParseError>) {
        match self.try_parse(raw) {
            Ok(plan) => (plan, None),
            Err(err) => {
                tracing::warn!("Plan parse failed ({}), using fallback plan", err);
                (self.fallback_plan(raw, &err), Some(err))
            }
        }
    }

    /// 宽松解析：总是返回一个计划
    pub fn parse(&self, raw: &str) -> Plan {
        self.parse_detailed(raw).0
    }

    /// 根据原始文本生成只含一个安全步骤的兜底计划
    pub fn fallback_plan(&self, raw: &str, err: &ParseError) -> Plan {
        let kind = ResponseKind::detect(raw);
        let cleaned = self.clean(raw);
        let trimmed = cleaned.trim();
        let preview = if trimmed.is_empty() {
            "(empty response)".to_string()
        } else {
            truncate_chars(trimmed, FALLBACK_PREVIEW_CHARS).to_string()
        };
        let mut input = serde_json::Map::new();
        input.insert("text".to_string(), serde_json::Value::String(preview));

        Plan {
            analysis: format!(
                "Could not parse a plan ({err}); the response looks like {}.",
                kind.label()
            ),
            steps: vec![Action::new(self.fallback_tool.clone(), input)
                .with_name("fallback")
                .with_description("Echo the unparsed model response")],
            reasoning: "fallback".to_string(),
        }
    }
}
