//! 推理回调抽象
//!
//! 引擎只负责构造 prompt 与解析回复，从不直接对接任何模型协议；宿主实现 ReasoningClient
//! （或用 FnReasoner 包装一个闭包），传输层重试等由宿主自行处理。

use std::future::Future;

use async_trait::async_trait;

/// 推理客户端：输入完整 prompt，返回模型原始文本
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn reason(&self, prompt: &str) -> Result<String, String>;
}

/// 闭包适配器：`FnReasoner::new(|prompt| async move { ... })`
pub struct FnReasoner<F> {
    f: F,
}

impl<F> FnReasoner<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ReasoningClient for FnReasoner<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, String>> + Send + 'static,
{
    async fn reason(&self, prompt: &str) -> Result<String, String> {
        (self.f)(prompt.to_string()).await
    }
}
