//! 指令格式说明与 JSON Schema（schemars 自动生成），拼入生成器的 preamble
//!
//! DIRECTIVE_FORMATS 是逐字写入 prompt 的三种指令格式；schema 仅在 include_schemas 时附加。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

/// 三种指令的线上格式，原样写入 preamble
pub const DIRECTIVE_FORMATS: &str = r#"To request an action, emit a Task block containing one JSON object:
```Task
{"id": "unique-id", "kind": "capability-kind", "params": {}, "dependsOn": ["other-id"]}
```
`id` and `kind` are required; `params` (object) and `dependsOn` (array of ids) are optional.

To show a component to the user, emit a Ui block:
```Ui
{"id": "unique-id", "type": "ComponentType", "props": {}, "events": ["eventName"]}
```
`id` and `type` are required; `props` and `events` are optional.

To work through steps one at a time, emit a Thinking block with an ordered plan:
```Thinking
{"tasks": [{"id": "step-1", "kind": "capability-kind", "params": {}}]}
```
`tasks` is required; each entry has the same shape as a Task block."#;

/// Task 指令格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
#[serde(rename_all = "camelCase")]
struct TaskFormat {
    /// 本轮对话内唯一的 id
    pub id: String,
    /// 能力名，必须是已注册的 kind
    pub kind: String,
    /// 能力参数
    pub params: Option<HashMap<String, serde_json::Value>>,
    /// 依赖的 Task id，全部有结果后才执行
    pub depends_on: Option<Vec<String>>,
}

/// Ui 指令格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct UiFormat {
    pub id: String,
    /// 组件类型
    #[serde(rename = "type")]
    pub component: String,
    pub props: Option<HashMap<String, serde_json::Value>>,
    pub events: Option<serde_json::Value>,
}

/// Thinking 指令格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ThinkingFormat {
    /// 按顺序逐步执行的 Task
    pub tasks: Vec<TaskFormat>,
}

/// 返回三种指令的 JSON Schema，按 Task / Ui / Thinking 顺序
pub fn directive_schemas_json() -> Vec<(&'static str, String)> {
    let pretty = |schema: schemars::schema::RootSchema| {
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    };
    vec![
        ("Task", pretty(schema_for!(TaskFormat))),
        ("Ui", pretty(schema_for!(UiFormat))),
        ("Thinking", pretty(schema_for!(ThinkingFormat))),
    ]
}
