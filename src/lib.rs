//! TaskBee - LLM 驱动的任务执行引擎
//!
//! 模块划分：
//! - **config**: 引擎配置加载（TOML + 环境变量）
//! - **core**: 任务编排、步骤执行、有界恢复、执行事件与错误类型
//! - **llm**: 推理回调抽象与 Mock 实现
//! - **memory**: Agent 私有键值记忆（工具可读写）
//! - **observability**: tracing 日志初始化
//! - **plan**: 计划解析、依赖替换与 prompt 构造
//! - **task**: Agent / Task / Step 数据模型与状态机
//! - **tools**: 工具 trait、注册表、执行器与内置工具

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod plan;
pub mod task;
pub mod tools;

pub use crate::core::{EngineError, TaskEvent, TaskOrchestrator};
pub use crate::llm::{MockReasoner, ReasoningClient};
pub use crate::task::{Agent, AgentState, Task, TaskStatus};
pub use crate::tools::{Tool, ToolRegistry};
