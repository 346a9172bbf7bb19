//! 生成器层：Generator trait 与 Mock 实现

pub mod mock;
pub mod traits;

pub use mock::{MockGenerator, ScriptedGenerator};
pub use traits::Generator;
