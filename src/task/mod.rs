//! 数据模型：Agent、Task、Step 及其状态机

pub mod agent;
pub mod types;

pub use agent::{Agent, AgentState};
pub use types::{Step, StepKind, Task, TaskStatus, REASONING_STEP_NAME};
