//! Taskloom 演示入口
//!
//! 初始化日志、加载配置，用 MockGenerator 跑一轮对话并打印历史（JSON）。
//! 用法：taskloom [用户输入]，配置路径可通过 TASKLOOM_CONFIG 指定。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use taskloom::{config::load_config, llm::MockGenerator, observability, EngineBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::var_os("TASKLOOM_CONFIG").map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;

    let input = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let input = if input.trim().is_empty() {
        "Hello, Taskloom".to_string()
    } else {
        input
    };

    let engine = EngineBuilder::new(config, Arc::new(MockGenerator)).build();
    let outcome = engine.chat(input).await.context("Chat turn failed")?;

    if outcome.stop_reason.is_warning() {
        tracing::warn!(reason = ?outcome.stop_reason, "Turn ended early");
    }

    let history =
        serde_json::to_string_pretty(&outcome.history).context("Failed to serialize history")?;
    println!("{}", history);
    Ok(())
}
