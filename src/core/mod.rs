//! 核心层：错误类型与依赖队列

pub mod error;
pub mod queue;

pub use error::{EngineError, QueueError};
pub use queue::{Blocked, DependencyQueue};
