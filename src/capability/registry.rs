//! 能力注册表
//!
//! 所有能力实现 Capability trait（kind / description / signature / run），由 CapabilityRegistry 按 kind 注册，
//! 构建完成后整体移入 ActionRunner，运行期不再增删。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::capability::RuntimeContext;

/// 能力 trait：kind（Task 中的 "kind" 字段）、描述与签名（供生成器理解）、异步执行
#[async_trait]
pub trait Capability: Send + Sync {
    /// 能力名，对应 Task 指令的 kind
    fn kind(&self) -> &str;

    /// 能力描述
    fn description(&self) -> &str;

    /// 参数签名提示，写入 preamble
    fn signature(&self) -> &str {
        "params: {} -> any"
    }

    async fn run(&self, params: Value, ctx: &RuntimeContext) -> Result<Value, String>;
}

/// 能力描述条目，用于拼 preamble
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityInfo {
    pub kind: String,
    pub description: String,
    pub signature: String,
}

/// kind -> 能力；BTreeMap 保证 preamble 中的顺序稳定
#[derive(Default)]
pub struct CapabilityRegistry {
    handlers: BTreeMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册能力；同名 kind 后注册者覆盖先注册者
    pub fn register(&mut self, capability: impl Capability + 'static) {
        self.register_arc(Arc::new(capability));
    }

    pub fn register_arc(&mut self, capability: Arc<dyn Capability>) {
        let kind = capability.kind().to_string();
        if self.handlers.insert(kind.clone(), capability).is_some() {
            tracing::warn!("Capability {} registered twice; keeping the latest", kind);
        }
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Capability>> {
        self.handlers.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn describe(&self) -> Vec<CapabilityInfo> {
        self.handlers
            .values()
            .map(|c| CapabilityInfo {
                kind: c.kind().to_string(),
                description: c.description().to_string(),
                signature: c.signature().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
