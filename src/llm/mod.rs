//! LLM 层：推理回调抽象、闭包适配器与 Mock 实现

pub mod mock;
pub mod traits;

pub use mock::MockReasoner;
pub use traits::{FnReasoner, ReasoningClient};
