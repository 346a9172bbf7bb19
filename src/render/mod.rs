//! 渲染器接口
//!
//! DisplayRequest 只是数据：引擎在一轮结束时对每个 id 调一次 mount，其余交给外部渲染器。
//! 外部事件（DisplayEvent）的回流不在引擎范围内。

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::directive::DisplayRequest;

/// 渲染器：按 DisplayRequest.id 管理组件
pub trait Renderer: Send + Sync {
    fn mount(&self, display: &DisplayRequest);

    fn update(&self, _id: &str, _props: &Map<String, Value>) {}

    fn unmount(&self, _id: &str) {}
}

/// 外部来源的组件事件（如按钮点击）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayEvent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub payload: Value,
}

/// 只写日志的渲染器（无界面宿主的默认值）
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn mount(&self, request: &DisplayRequest) {
        tracing::info!(id = %request.id, component = %request.component, "mount display");
    }

    fn update(&self, id: &str, _props: &Map<String, Value>) {
        tracing::info!(id = %id, "update display");
    }

    fn unmount(&self, id: &str) {
        tracing::info!(id = %id, "unmount display");
    }
}

/// 渲染操作记录
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    Mount(DisplayRequest),
    Update { id: String, props: Map<String, Value> },
    Unmount(String),
}

/// 记录所有操作的渲染器，供测试与宿主回放
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    ops: Mutex<Vec<RenderOp>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<RenderOp> {
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 已 mount 的 id（按顺序）
    pub fn mounted_ids(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                RenderOp::Mount(d) => Some(d.id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, op: RenderOp) {
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).push(op);
    }
}

impl Renderer for RecordingRenderer {
    fn mount(&self, display: &DisplayRequest) {
        self.record(RenderOp::Mount(display.clone()));
    }

    fn update(&self, id: &str, props: &Map<String, Value>) {
        self.record(RenderOp::Update {
            id: id.to_string(),
            props: props.clone(),
        });
    }

    fn unmount(&self, id: &str) {
        self.record(RenderOp::Unmount(id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card(id: &str) -> DisplayRequest {
        serde_json::from_value(json!({"id": id, "type": "Card", "props": {"title": id}})).unwrap()
    }

    #[test]
    fn test_tracing_renderer_accepts_all_ops() {
        let renderer = TracingRenderer;
        renderer.mount(&card("a"));
        renderer.update("a", &Map::new());
        renderer.unmount("a");
    }

    #[test]
    fn test_recording_renderer_keeps_order() {
        let renderer = RecordingRenderer::new();
        renderer.mount(&card("a"));
        renderer.mount(&card("b"));
        renderer.unmount("a");
        assert_eq!(renderer.mounted_ids(), vec!["a", "b"]);
        assert_eq!(renderer.ops().len(), 3);
        assert_eq!(renderer.ops()[2], RenderOp::Unmount("a".to_string()));
    }
}
