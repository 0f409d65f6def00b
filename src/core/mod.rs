//! 核心执行层：错误类型、步骤执行、有界恢复、执行事件与任务编排

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod recovery;
pub mod step;

pub use error::EngineError;
pub use events::TaskEvent;
pub use orchestrator::TaskOrchestrator;
pub use recovery::RecoveryPlanner;
pub use step::{StepExecutor, StepFailure};
