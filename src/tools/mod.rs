//! 工具层：Tool trait、注册表、带超时的执行器与内置工具

pub mod echo;
pub mod executor;
pub mod kv;
pub mod math;
pub mod registry;
pub mod text;

pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use kv::{MemoryGetTool, MemorySetTool};
pub use math::{AddTool, MultiplyTool};
pub use registry::{Tool, ToolRegistry};
pub use text::{LowercaseTool, ReverseTool, UppercaseTool, WordCountTool};
