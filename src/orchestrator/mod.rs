//! 编排层：Prompt 构建、过程事件、主循环

pub mod events;
pub mod loop_;
pub mod prompt;

pub use events::{OrchestratorEvent, StopReason};
pub use loop_::{ChatInput, ChatOptions, ChatOutcome, Orchestrator};
pub use prompt::PromptBuilder;
