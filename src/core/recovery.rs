//! 恢复规划器
//!
//! 工具级失败（错误文本命中 "tool" / "parameter" 等关键词）时，用失败动作的 name / tool / input / error
//! 构造一个简短的修正 prompt，请模型给出一个修正后的动作，并用主规划同一个 PlanParser 解析。
//! 超时、推理失败等基础设施错误不在这里重试；每个失败步骤至多恢复一次，由编排器保证。

use std::sync::Arc;

use crate::config::EngineSection;
use crate::core::EngineError;
use crate::llm::ReasoningClient;
use crate::plan::{build_recovery_prompt, Action, PlanParser};

/// 恢复规划器：持有推理回调、计划解析器与触发关键词
pub struct RecoveryPlanner {
    reasoner: Arc<dyn ReasoningClient>,
    parser: PlanParser,
    enabled: bool,
    keywords: Vec<String>,
}

impl RecoveryPlanner {
    pub fn new(reasoner: Arc<dyn ReasoningClient>, parser: PlanParser) -> Self {
        Self::from_config(reasoner, parser, &EngineSection::default())
    }

    pub fn from_config(
        reasoner: Arc<dyn ReasoningClient>,
        parser: PlanParser,
        config: &EngineSection,
    ) -> Self {
        Self {
            reasoner,
            parser,
            enabled: config.recovery_enabled,
            keywords: config
                .recovery_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    /// 仅工具自身报告的错误、且文本命中关键词时才尝试恢复
    pub fn should_recover(&self, err: &EngineError) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(message) = err.tool_message() else {
            return false;
        };
        let message = message.to_lowercase();
        self.keywords.iter().any(|k| message.contains(k.as_str()))
    }

    /// 请求一个修正后的动作；不符合条件、推理失败、解析失败或零步骤均返回 Recovery 错误
    pub async fn recover(&self, failed: &Action, err: &EngineError) -> Result<Action, EngineError> {
        if !self.should_recover(err) {
            return Err(EngineError::Recovery(format!(
                "error is not eligible for recovery: {err}"
            )));
        }
        let prompt = build_recovery_prompt(failed, &err.to_string());
        tracing::debug!(tool = %failed.tool, "requesting corrected step");

        let raw = self
            .reasoner
            .reason(&prompt)
            .await
            .map_err(|e| EngineError::Recovery(format!("reasoning failed: {e}")))?;
        let plan = self
            .parser
            .try_parse(&raw)
            .map_err(|e| EngineError::Recovery(format!("could not parse corrected step: {e}")))?;
        if plan.len() > 1 {
            tracing::warn!(
                "Recovery proposed {} steps, using only the first",
                plan.len()
            );
        }
        plan.steps
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Recovery("no corrected step proposed".to_string()))
    }
}
