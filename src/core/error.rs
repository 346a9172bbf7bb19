//! 引擎错误类型
//!
//! 只有生成器失败、取消与队列契约被破坏会以 Err 返回；
//! 指令解析失败、未知能力、处理器失败都在各自边界内被吸收（见 directive / capability）。

use thiserror::Error;

/// 单轮对话（chat）返回的错误：出现即结束本轮
#[derive(Error, Debug)]
pub enum EngineError {
    /// 生成器调用失败，不在引擎内重试或吞掉
    #[error("Generator error: {0}")]
    Generator(String),

    /// Orchestrator 违反了 DependencyQueue 的契约（内部 bug）
    #[error("Queue invariant violated: {0}")]
    QueueInvariant(#[from] QueueError),

    #[error("Cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

/// DependencyQueue 契约错误：complete 了一个不在 pending 中的 id
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("action {0} was never enqueued")]
    Unknown(String),

    #[error("action {0} already has a result")]
    AlreadyCompleted(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::Config(e.to_string())
    }
}
