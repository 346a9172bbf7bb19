//! Mock 生成器（用于测试与本地演示，无需后端）
//!
//! - ScriptedGenerator：按顺序返回预设回复，并记录每次收到的 prompt
//! - MockGenerator：若 prompt 中尚无工具结果则回一个 echo Task，否则给出最终回复

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::Generator;

/// 预设回复序列；用尽后返回错误
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// 追加一次失败
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.lock_responses().push_back(Err(message.into()));
        self
    }

    /// 已收到的 prompt（按调用顺序）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        self.lock_responses()
            .pop_front()
            .unwrap_or_else(|| Err("ScriptedGenerator: no more responses".to_string()))
    }
}

/// 演示用生成器：第一次回一个 echo Task，看到工具结果后给出最终回复
#[derive(Debug, Default)]
pub struct MockGenerator;

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, String> {
        let conversation = prompt.rsplit("## Conversation").next().unwrap_or(prompt);
        if let Some(idx) = conversation.rfind("Tool[") {
            let observed = conversation[idx..].lines().next().unwrap_or_default();
            return Ok(format!("Done. Last observation: {}", observed));
        }
        let last_user = conversation
            .lines()
            .rev()
            .find_map(|l| l.strip_prefix("User: "))
            .unwrap_or("(no input)");
        let task = serde_json::json!({
            "id": "echo-1",
            "kind": "echo",
            "params": { "text": format!("Echo from Mock: {}", last_user) }
        });
        Ok(format!("Let me echo that.\n```Task\n{}\n```", task))
    }
}
