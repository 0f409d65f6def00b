//! Agent 私有键值记忆
//!
//! 一个 Agent 的所有任务共享同一份记忆；工具通过 memory_get / memory_set 读写。
//! 克隆只复制句柄，底层 map 由 RwLock 保护，可被并发执行的任务安全访问。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

/// 共享键值存储句柄
#[derive(Debug, Clone, Default)]
pub struct AgentMemory {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    /// 写入并返回旧值
    pub async fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.write().await.insert(key.into(), value)
    }
}
