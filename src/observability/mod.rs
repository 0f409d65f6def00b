//! 可观测性：tracing 日志初始化
//!
//! 默认 info 级别，可通过 RUST_LOG 覆盖（如 `RUST_LOG=taskbee=debug`）。
//! 工具调用的 JSON 审计行由 ToolExecutor 以 info 级别输出。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化全局 subscriber；重复调用会 panic，库内请用 try_init
pub fn init() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer())
        .init();
}

/// 同 init，但已初始化时返回 false 而不是 panic（测试中可多次调用）
pub fn try_init() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer())
        .try_init()
        .is_ok()
}
