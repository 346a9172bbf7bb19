//! Directive Extractor：从生成文本中提取 Task / Ui / Thinking 指令块
//!
//! 指令块形如 ```` ```Task\n{...}\n``` ````（也接受单个反引号作围栏），块内是一个 JSON 对象。
//! 用正则定位块起点，再按括号配对截取 JSON（跳过字符串内的括号），因此载荷可以嵌套任意层。
//! 格式错误或缺少必需字段的块被丢弃并记录 warning，不影响同一文本中其它块。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::directive::{ActionRequest, DisplayRequest, Extraction, Plan};

/// 指令标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveTag {
    Task,
    Ui,
    Thinking,
}

impl DirectiveTag {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "Task" => Some(DirectiveTag::Task),
            "Ui" => Some(DirectiveTag::Ui),
            "Thinking" => Some(DirectiveTag::Thinking),
            _ => None,
        }
    }
}

impl std::fmt::Display for DirectiveTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectiveTag::Task => f.write_str("Task"),
            DirectiveTag::Ui => f.write_str("Ui"),
            DirectiveTag::Thinking => f.write_str("Thinking"),
        }
    }
}

/// 单个指令块被丢弃的原因；offset 为块起点在原文中的字节位置
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("{tag} block at byte {offset}: unterminated JSON object")]
    Unterminated { tag: DirectiveTag, offset: usize },

    #[error("{tag} block at byte {offset}: invalid JSON: {reason}")]
    InvalidJson {
        tag: DirectiveTag,
        offset: usize,
        reason: String,
    },

    #[error("{tag} block at byte {offset}: missing required field `{field}`")]
    MissingField {
        tag: DirectiveTag,
        offset: usize,
        field: &'static str,
    },

    #[error("{tag} block at byte {offset}: invalid field: {reason}")]
    InvalidField {
        tag: DirectiveTag,
        offset: usize,
        reason: String,
    },
}

fn opener() -> &'static Regex {
    static OPENER: OnceLock<Regex> = OnceLock::new();
    OPENER.get_or_init(|| {
        Regex::new(r"(`{3}|`)[ \t]*(Task|Ui|Thinking)\b").expect("directive opener regex")
    })
}

/// 解析一次生成输出；纯函数，永不失败
pub fn extract(text: &str) -> Extraction {
    let mut out = Extraction {
        text: text.to_string(),
        ..Default::default()
    };

    let mut pos = 0;
    while pos < text.len() {
        let Some(caps) = opener().captures_at(text, pos) else {
            break;
        };
        let (Some(whole), Some(fence), Some(tag)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            break;
        };
        let Some(tag) = DirectiveTag::parse(tag.as_str()) else {
            pos = whole.end();
            continue;
        };
        let offset = whole.start();

        let fence = fence.as_str();
        let body_start = skip_whitespace(text, whole.end());
        // 块之后的扫描起点：本块闭合围栏之后，找不到围栏则紧跟标签之后
        let resume = closing_fence_end(text, body_start, fence).unwrap_or(whole.end());

        if !text[body_start..].starts_with('{') {
            // ```Tag 独占一行是真正的指令块；其它情况只是正文里提到了标签名
            if fence.len() == 3 && opens_line_block(text, whole.end()) {
                reject(
                    &mut out,
                    ExtractionError::InvalidJson {
                        tag,
                        offset,
                        reason: "payload is not a JSON object".to_string(),
                    },
                );
                pos = resume;
            } else {
                pos = whole.end();
            }
            continue;
        }

        let Some(body_end) = scan_object(text, body_start, fence) else {
            reject(&mut out, ExtractionError::Unterminated { tag, offset });
            pos = resume;
            continue;
        };
        pos = consume_fence(text, body_end, fence);

        match parse_block(tag, offset, &text[body_start..body_end], &mut out.rejected) {
            Ok(Block::Task(req)) => out.requests.push(req),
            Ok(Block::Ui(display)) => out.displays.push(display),
            Ok(Block::Thinking(plan)) => {
                if out.plan.is_some() {
                    tracing::debug!(offset, "multiple Thinking blocks; the last one wins");
                }
                out.plan = Some(plan);
            }
            Err(e) => reject(&mut out, e),
        }
    }

    out
}

fn reject(out: &mut Extraction, e: ExtractionError) {
    tracing::warn!("Dropping directive: {}", e);
    out.rejected.push(e);
}

enum Block {
    Task(ActionRequest),
    Ui(DisplayRequest),
    Thinking(Plan),
}

fn parse_block(
    tag: DirectiveTag,
    offset: usize,
    payload: &str,
    rejected: &mut Vec<ExtractionError>,
) -> Result<Block, ExtractionError> {
    let value: Value = serde_json::from_str(payload).map_err(|e| ExtractionError::InvalidJson {
        tag,
        offset,
        reason: e.to_string(),
    })?;
    let Value::Object(obj) = value else {
        return Err(ExtractionError::InvalidJson {
            tag,
            offset,
            reason: "payload is not an object".to_string(),
        });
    };

    match tag {
        DirectiveTag::Task => parse_task(obj, tag, offset).map(Block::Task),
        DirectiveTag::Ui => {
            require_string(&obj, "id", tag, offset)?;
            require_string(&obj, "type", tag, offset)?;
            serde_json::from_value(Value::Object(obj))
                .map(Block::Ui)
                .map_err(|e| ExtractionError::InvalidField {
                    tag,
                    offset,
                    reason: e.to_string(),
                })
        }
        DirectiveTag::Thinking => {
            let tasks = match obj.get("tasks") {
                None => {
                    return Err(ExtractionError::MissingField {
                        tag,
                        offset,
                        field: "tasks",
                    })
                }
                Some(Value::Array(items)) => items.clone(),
                Some(_) => {
                    return Err(ExtractionError::InvalidField {
                        tag,
                        offset,
                        reason: "`tasks` must be an array".to_string(),
                    })
                }
            };
            let mut steps = Vec::with_capacity(tasks.len());
            for item in tasks {
                let parsed = match item {
                    Value::Object(task) => parse_task(task, tag, offset),
                    _ => Err(ExtractionError::InvalidField {
                        tag,
                        offset,
                        reason: "plan step is not an object".to_string(),
                    }),
                };
                match parsed {
                    Ok(step) => steps.push(step),
                    Err(e) => {
                        // 单个步骤无效只丢弃该步骤
                        tracing::warn!("Dropping plan step: {}", e);
                        rejected.push(e);
                    }
                }
            }
            Ok(Block::Thinking(Plan::new(steps)))
        }
    }
}

fn parse_task(
    obj: Map<String, Value>,
    tag: DirectiveTag,
    offset: usize,
) -> Result<ActionRequest, ExtractionError> {
    require_string(&obj, "id", tag, offset)?;
    require_string(&obj, "kind", tag, offset)?;
    serde_json::from_value(Value::Object(obj)).map_err(|e| ExtractionError::InvalidField {
        tag,
        offset,
        reason: e.to_string(),
    })
}

fn require_string(
    obj: &Map<String, Value>,
    field: &'static str,
    tag: DirectiveTag,
    offset: usize,
) -> Result<(), ExtractionError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ExtractionError::MissingField { tag, offset, field }),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ExtractionError::MissingField { tag, offset, field })
        }
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(ExtractionError::InvalidField {
            tag,
            offset,
            reason: format!("`{field}` must be a string"),
        }),
    }
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// 标签后到行尾只有空白
fn opens_line_block(text: &str, tag_end: usize) -> bool {
    let rest = text[tag_end..].trim_start_matches([' ', '\t']);
    rest.starts_with('\n') || rest.starts_with("\r\n")
}

fn closing_fence_end(text: &str, from: usize, fence: &str) -> Option<usize> {
    text[from..].find(fence).map(|i| from + i + fence.len())
}

/// 从 `start`（必须是 '{'）开始配对括号，返回对象结束后的位置；字符串内的括号与转义不计入。
/// 在字符串外遇到围栏即视为未闭合，不会越过本块读到后面的块。
fn scan_object(text: &str, start: usize, fence: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let fence = fence.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'`' if bytes[i..].starts_with(fence) => return None,
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// 跳过对象后的空白与闭合围栏（若存在）
fn consume_fence(text: &str, from: usize, fence: &str) -> usize {
    let after_ws = skip_whitespace(text, from);
    if text[after_ws..].starts_with(fence) {
        after_ws + fence.len()
    } else {
        from
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_task_in_prose() {
        let text = "Let me check.\n```Task\n{\"id\":\"a\",\"kind\":\"x\",\"params\":{\"p\":1}}\n```\nOne moment.";
        let ex = extract(text);
        assert_eq!(ex.text, text);
        assert_eq!(ex.requests.len(), 1);
        let req = &ex.requests[0];
        assert_eq!(req.id, "a");
        assert_eq!(req.kind, "x");
        assert_eq!(Value::Object(req.params.clone()), json!({"p": 1}));
        assert!(req.depends_on.is_empty());
        assert!(ex.rejected.is_empty());
    }

    #[test]
    fn test_single_backtick_fence() {
        let text = "prose `Task\n{\"id\":\"a\",\"kind\":\"x\",\"params\":{\"p\":1}}\n` more prose";
        let ex = extract(text);
        assert_eq!(ex.requests.len(), 1);
        assert_eq!(ex.requests[0].params.get("p"), Some(&json!(1)));
    }

    #[test]
    fn test_multiple_blocks_keep_order() {
        let text = r#"
```Task
{"id": "first", "kind": "echo"}
```
between
```Ui
{"id": "card", "type": "Card", "props": {"title": "hi"}}
```
```Task
  {"id": "second", "kind": "echo", "dependsOn": ["first"]}
```
"#;
        let ex = extract(text);
        let ids: Vec<_> = ex.requests.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(ex.requests[1].depends_on, vec!["first".to_string()]);
        assert_eq!(ex.displays.len(), 1);
        assert_eq!(ex.displays[0].component, "Card");
        assert!(ex.plan.is_none());
    }

    #[test]
    fn test_nested_braces_and_braces_in_strings() {
        let text = "```Task\n{\"id\":\"n\",\"kind\":\"k\",\"params\":{\"a\":{\"b\":{\"c\":\"}{ not a brace \\\" }\"}}}}\n```";
        let ex = extract(text);
        assert_eq!(ex.requests.len(), 1);
        assert_eq!(
            ex.requests[0].params.get("a"),
            Some(&json!({"b": {"c": "}{ not a brace \" }"}}))
        );
    }

    #[test]
    fn test_malformed_block_does_not_block_others() {
        let text = r#"
```Task
{"id": "bad", "kind": }
```
```Task
{"kind": "no-id"}
```
```Ui
{"id": "u1"}
```
```Task
{"id": "good", "kind": "echo"}
```
"#;
        let ex = extract(text);
        assert_eq!(ex.requests.len(), 1);
        assert_eq!(ex.requests[0].id, "good");
        assert!(ex.displays.is_empty());
        assert_eq!(ex.rejected.len(), 3);
        assert!(matches!(ex.rejected[0], ExtractionError::InvalidJson { .. }));
        assert!(matches!(
            ex.rejected[1],
            ExtractionError::MissingField { field: "id", .. }
        ));
        assert!(matches!(
            ex.rejected[2],
            ExtractionError::MissingField { field: "type", .. }
        ));
    }

    #[test]
    fn test_unterminated_block_is_dropped() {
        let ex = extract("```Task\n{\"id\": \"a\", \"kind\": \"x\"");
        assert!(ex.requests.is_empty());
        assert!(matches!(ex.rejected[0], ExtractionError::Unterminated { .. }));
    }

    #[test]
    fn test_unterminated_block_does_not_hide_later_blocks() {
        let text = "```Task\n{\"id\":\"bad\",\"kind\":\"x\"\n```\nThen:\n```Task\n{\"id\":\"good\",\"kind\":\"echo\"}\n```";
        let ex = extract(text);
        let ids: Vec<_> = ex.requests.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["good"]);
        assert_eq!(
            ex.rejected,
            vec![ExtractionError::Unterminated {
                tag: DirectiveTag::Task,
                offset: 0
            }]
        );
    }

    #[test]
    fn test_unbalanced_block_stops_at_its_own_fence() {
        let text = "```Task\n{\"id\":\"bad\",\"params\":{\n```\n```Ui\n{\"id\":\"card\",\"type\":\"Card\"}\n```\n}}";
        let ex = extract(text);
        assert!(ex.requests.is_empty());
        assert_eq!(ex.displays.len(), 1);
        assert_eq!(ex.displays[0].id, "card");
        assert!(matches!(ex.rejected[0], ExtractionError::Unterminated { .. }));
    }

    #[test]
    fn test_fenced_block_with_non_object_payload_is_rejected() {
        let text = "```Task\n[\"id\",\"a\"]\n```\n```Ui\nnot json\n```\n```Task\n{\"id\":\"ok\",\"kind\":\"echo\"}\n```";
        let ex = extract(text);
        assert_eq!(ex.requests.len(), 1);
        assert_eq!(ex.requests[0].id, "ok");
        assert_eq!(ex.rejected.len(), 2);
        assert!(matches!(
            ex.rejected[0],
            ExtractionError::InvalidJson { tag: DirectiveTag::Task, .. }
        ));
        assert!(matches!(
            ex.rejected[1],
            ExtractionError::InvalidJson { tag: DirectiveTag::Ui, .. }
        ));
    }

    #[test]
    fn test_wrong_field_types_are_rejected() {
        let text = "```Task\n{\"id\": 7, \"kind\": \"x\"}\n```\n```Task\n{\"id\": \"a\", \"kind\": \"x\", \"params\": [1]}\n```";
        let ex = extract(text);
        assert!(ex.requests.is_empty());
        assert_eq!(ex.rejected.len(), 2);
    }

    #[test]
    fn test_tag_mention_is_not_a_directive() {
        let ex = extract("Use a `Task` block to call tools, or `Ui` for cards.");
        assert!(ex.requests.is_empty());
        assert!(ex.rejected.is_empty());
    }

    #[test]
    fn test_last_plan_wins() {
        let text = r#"
```Thinking
{"tasks": [{"id": "p1", "kind": "echo"}]}
```
```Thinking
{"tasks": [{"id": "q1", "kind": "echo"}, {"id": "q2", "kind": "wait", "params": {"ms": 5}}]}
```
"#;
        let ex = extract(text);
        let plan = ex.plan.expect("plan");
        let ids: Vec<_> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2"]);
    }

    #[test]
    fn test_plan_requires_tasks_array() {
        let ex = extract("```Thinking\n{\"steps\": []}\n```");
        assert!(ex.plan.is_none());
        assert!(matches!(
            ex.rejected[0],
            ExtractionError::MissingField { field: "tasks", .. }
        ));
    }

    #[test]
    fn test_plan_drops_only_bad_steps() {
        let ex = extract("```Thinking\n{\"tasks\": [{\"id\": \"a\"}, {\"id\": \"b\", \"kind\": \"echo\"}, 3]}\n```");
        let plan = ex.plan.expect("plan");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].id, "b");
        assert_eq!(ex.rejected.len(), 2);
    }

    #[test]
    fn test_plain_text_has_no_directives() {
        let ex = extract("It is 21°C and sunny in Paris.");
        assert!(!ex.has_work());
        assert!(ex.displays.is_empty());
    }

    #[test]
    fn test_serialized_request_reparses_identically() {
        let req = ActionRequest::new("r", "calculate")
            .with_params(json!({"op": "add", "a": 2, "b": 3.5, "meta": {"tags": ["x"]}}))
            .depends_on(["q"]);
        let text = format!(
            "```Task\n{}\n```",
            serde_json::to_string_pretty(&req).unwrap()
        );
        let ex = extract(&text);
        assert_eq!(ex.requests, vec![req]);
    }
}
