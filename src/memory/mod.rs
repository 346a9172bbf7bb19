//! 对话历史

pub mod history;

pub use history::{History, HistoryEntry};
