//! Taskloom - 指令驱动的编排引擎
//!
//! 生成器输出的文本里夹带三类指令块（```Task / ```Ui / ```Thinking），
//! 引擎负责解析、按依赖执行动作、把结果回填到历史，再交回生成器观察，直到没有新工作。
//!
//! 模块划分：
//! - **agent**: EngineBuilder，按配置组装能力、运行器与编排器
//! - **capability**: 能力注册表、ActionRunner 与内置能力（echo / callApi / wait / calculate）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与依赖队列
//! - **directive**: 指令提取与数据类型
//! - **llm**: 生成器抽象与测试用实现
//! - **memory**: 对话历史
//! - **observability**: tracing 初始化
//! - **orchestrator**: 单轮对话主循环（批量 / 按计划步进）
//! - **render**: 显示挂载抽象

pub mod agent;
pub mod capability;
pub mod config;
pub mod core;
pub mod directive;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod orchestrator;
pub mod render;

pub use agent::EngineBuilder;
pub use orchestrator::{ChatOutcome, Orchestrator, StopReason};
