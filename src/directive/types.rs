//! 指令数据模型：ActionRequest / ActionResult / DisplayRequest / Plan
//!
//! 字段名与线上格式一致（`dependsOn`、`type`），serde 直接读写指令块中的 JSON。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 一个待执行的动作（`Task` 指令）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    /// 本轮对话内唯一
    pub id: String,
    /// 能力选择器，对应 Capability::kind
    pub kind: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    /// 依赖的 id，全部有结果后才可执行
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ActionRequest {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            params: Map::new(),
            depends_on: Vec::new(),
        }
    }

    /// 设置参数；非 object 的值被忽略
    pub fn with_params(mut self, params: Value) -> Self {
        if let Value::Object(map) = params {
            self.params = map;
        }
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// 动作执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Ok,
    Error,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Ok => f.write_str("ok"),
            ActionStatus::Error => f.write_str("error"),
        }
    }
}

/// 动作执行结果：每个被派发的 ActionRequest 恰好产生一个，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub id: String,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(id: impl Into<String>, output: Value) -> Self {
        Self {
            id: id.into(),
            status: ActionStatus::Ok,
            output: Some(output),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ActionStatus::Error,
            output: None,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ActionStatus::Ok
    }
}

/// 展示请求（`Ui` 指令）：纯数据，交给外部 Renderer，不参与依赖解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub component: String,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Value>,
}

/// 计划（`Thinking` 指令）：逐步执行，每步之后重新调用生成器
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "tasks")]
    pub steps: Vec<ActionRequest>,
}

impl Plan {
    pub fn new(steps: Vec<ActionRequest>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// 一次生成输出的解析结果
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// 原始文本，不做任何裁剪
    pub text: String,
    pub requests: Vec<ActionRequest>,
    pub displays: Vec<DisplayRequest>,
    /// 多个 Thinking 块时以最后一个为准
    pub plan: Option<Plan>,
    /// 被丢弃的块（仅诊断用）
    pub rejected: Vec<super::ExtractionError>,
}

impl Extraction {
    /// 是否包含任何可执行内容（请求或计划）
    pub fn has_work(&self) -> bool {
        !self.requests.is_empty() || self.plan.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_names() {
        let req = ActionRequest::new("b", "callApi")
            .with_params(json!({"url": "https://example.com", "retries": 2}))
            .depends_on(["a"]);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["dependsOn"], json!(["a"]));
        assert_eq!(v["params"]["retries"], json!(2));
        assert!(v.get("depends_on").is_none());
    }

    #[test]
    fn test_request_round_trip_keeps_types() {
        let raw = json!({
            "id": "a",
            "kind": "x",
            "params": {"n": 1, "f": 1.5, "nested": {"list": [1, "two", null]}, "flag": true},
            "dependsOn": ["z", "y"]
        });
        let req: ActionRequest = serde_json::from_value(raw.clone()).unwrap();
        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back, raw);
        let again: ActionRequest = serde_json::from_value(back).unwrap();
        assert_eq!(again, req);
    }

    #[test]
    fn test_result_round_trip() {
        let ok = ActionResult::ok("a", json!({"temp": 21, "unit": "C"}));
        let text = serde_json::to_string(&ok).unwrap();
        assert!(text.contains("\"status\":\"ok\""));
        assert!(!text.contains("\"error\""));
        let parsed: ActionResult = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, ok);

        let err = ActionResult::error("b", "boom");
        let parsed: ActionResult =
            serde_json::from_str(&serde_json::to_string(&err).unwrap()).unwrap();
        assert_eq!(parsed.status, ActionStatus::Error);
        assert_eq!(parsed.error.as_deref(), Some("boom"));
        assert!(parsed.output.is_none());
    }

    #[test]
    fn test_display_type_field() {
        let d: DisplayRequest =
            serde_json::from_value(json!({"id": "card", "type": "WeatherCard"})).unwrap();
        assert_eq!(d.component, "WeatherCard");
        assert!(d.props.is_empty());
        assert!(d.events.is_none());
    }
}
