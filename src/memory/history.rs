//! 对话历史
//!
//! 只追加、不重排、不去重；每次调用生成器都由它重建 prompt 的对话部分。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::directive::{ActionResult, ActionStatus};

/// 单条历史记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum HistoryEntry {
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    Tool {
        id: String,
        status: ActionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        HistoryEntry::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        HistoryEntry::Assistant {
            content: content.into(),
        }
    }

    /// 由动作结果生成 tool 记录
    pub fn tool(result: &ActionResult) -> Self {
        HistoryEntry::Tool {
            id: result.id.clone(),
            status: result.status,
            output: result.output.clone(),
            error: result.error.clone(),
        }
    }

    /// tool 记录还原为 ActionResult（用于续聊时恢复已完成的 id）
    pub fn as_result(&self) -> Option<ActionResult> {
        match self {
            HistoryEntry::Tool {
                id,
                status,
                output,
                error,
            } => Some(ActionResult {
                id: id.clone(),
                status: *status,
                output: output.clone(),
                error: error.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, HistoryEntry::Tool { .. })
    }

    /// prompt 中的一行（或多行）表示
    pub fn render(&self) -> String {
        match self {
            HistoryEntry::User { content } => format!("User: {}", content),
            HistoryEntry::Assistant { content } => format!("Assistant: {}", content),
            HistoryEntry::Tool {
                id,
                status: ActionStatus::Ok,
                output,
                ..
            } => format!(
                "Tool[{}] (ok): {}",
                id,
                output.as_ref().unwrap_or(&Value::Null)
            ),
            HistoryEntry::Tool { id, error, .. } => format!(
                "Tool[{}] (error): {}",
                id,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// 单轮对话私有的历史（只追加）
#[derive(Clone, Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<HistoryEntry> {
        self.entries
    }

    /// 按时间顺序渲染全部记录
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(HistoryEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_entry_serializes_with_role_tag() {
        let entry = HistoryEntry::tool(&ActionResult::ok("w", json!({"temp": 21})));
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            v,
            json!({"role": "tool", "id": "w", "status": "ok", "output": {"temp": 21}})
        );
        let back: HistoryEntry = serde_json::from_value(v).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_render_order_and_format() {
        let mut h = History::new();
        h.push(HistoryEntry::user("weather in Paris"));
        h.push(HistoryEntry::assistant("checking"));
        h.push(HistoryEntry::tool(&ActionResult::error("w", "HTTP 500: down")));
        assert_eq!(
            h.render(),
            "User: weather in Paris\nAssistant: checking\nTool[w] (error): HTTP 500: down"
        );
    }
}
