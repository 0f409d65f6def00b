//! 规划层：计划类型、JSON 提取、容错解析、依赖解析与 prompt 构造

pub mod extract;
pub mod parser;
pub mod prompts;
pub mod resolver;
pub mod types;

pub use parser::{ParseError, PlanParser, ResponseKind};
pub use prompts::{build_reasoning_prompt, build_recovery_prompt};
pub use resolver::{DependencyResolver, StepReference};
pub use types::{Action, Plan};
