//! Mock 推理客户端（用于测试与演示，无需 API）
//!
//! 按顺序返回预设回复；队列耗尽后返回默认回复。记录每次收到的 prompt，便于断言。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::ReasoningClient;

/// 脚本化的 Mock 客户端
#[derive(Debug, Default)]
pub struct MockReasoner {
    responses: Mutex<VecDeque<Result<String, String>>>,
    default_response: String,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条成功回复
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// 追加一次失败（模拟网络错误等）
    pub fn with_error(self, error: impl Into<String>) -> Self {
        self.push(Err(error.into()));
        self
    }

    /// 队列耗尽后的回复
    pub fn with_default(mut self, text: impl Into<String>) -> Self {
        self.default_response = text.into();
        self
    }

    /// 每次调用前等待（用于超时 / 取消场景）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, item: Result<String, String>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(item);
    }

    /// 已收到的 prompt（按调用顺序）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ReasoningClient for MockReasoner {
    async fn reason(&self, prompt: &str) -> Result<String, String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        next.unwrap_or_else(|| Ok(self.default_response.clone()))
    }
}
