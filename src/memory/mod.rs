//! 记忆层：Agent 私有键值存储（跨任务共享，工具可读写）

pub mod store;

pub use store::AgentMemory;
