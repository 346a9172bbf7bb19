//! 生成器抽象
//!
//! 引擎只依赖 Generator：输入完整 prompt，返回一段文本；不涉及流式。

use std::sync::Arc;

use async_trait::async_trait;

/// 文本生成器 trait（非流式）
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, String>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn generate(&self, prompt: &str) -> Result<String, String> {
        (**self).generate(prompt).await
    }
}
