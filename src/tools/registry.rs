//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找；
//! 内部 map 由读写锁保护，运行期可并发注册与查找，对外只暴露窄接口，不暴露原始 map。
//! 未知工具名按普通工具错误处理（fail closed）。

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::EngineError;
use crate::memory::AgentMemory;
use crate::tools::{
    AddTool, EchoTool, LowercaseTool, MemoryGetTool, MemorySetTool, MultiplyTool, ReverseTool,
    UppercaseTool, WordCountTool,
};

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON，memory 为所属 Agent 的共享记忆）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（计划 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema，默认不限制
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具；返回值对引擎不透明，仅在依赖解析时读取 result 字段
    async fn execute(&self, args: Value, memory: &AgentMemory) -> Result<Value, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预注册全部内置工具（echo / add / multiply / 文本变换 / memory_get / memory_set）
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(EchoTool);
        registry.register(AddTool);
        registry.register(MultiplyTool);
        registry.register(UppercaseTool);
        registry.register(LowercaseTool);
        registry.register(ReverseTool);
        registry.register(WordCountTool);
        registry.register(MemoryGetTool);
        registry.register(MemorySetTool);
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Tool>>> {
        self.tools.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn Tool>>> {
        self.tools.write().unwrap_or_else(|e| e.into_inner())
    }

    /// 注册工具，同名覆盖
    pub fn register(&self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.write().insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// 按名调用；锁在 await 之前释放
    pub async fn call(
        &self,
        name: &str,
        args: Value,
        memory: &AgentMemory,
    ) -> Result<Value, EngineError> {
        let tool = self
            .get(name)
            .ok_or_else(|| EngineError::UnknownTool(name.to_string()))?;
        tool.execute(args, memory)
            .await
            .map_err(EngineError::ToolExecutionFailed)
    }

    /// 按名称排序的工具名列表
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// 指定工具的 schema JSON（name / description / parameters），未注册的名称跳过；
    /// 用于主规划 prompt 的工具说明
    pub fn schema_json(&self, names: &[String]) -> String {
        let tools = self.read();
        let list: Vec<Value> = names
            .iter()
            .filter_map(|name| tools.get(name).map(|tool| (name, tool)))
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&list).unwrap_or_else(|_| "[]".to_string())
    }
}
