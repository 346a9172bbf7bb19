//! Action Runner
//!
//! 持有固定的能力表与共享运行时上下文，run_task(request) 按 kind 派发并把任何结局归一为 ActionResult：
//! 未知 kind、处理器返回 Err、处理器 panic、超时都变成 status=error，从不向上返回错误。
//! 每次调用输出结构化审计日志（JSON）。

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::Value;
use thiserror::Error;

use crate::capability::{CapabilityInfo, CapabilityRegistry, RuntimeContext};
use crate::directive::{ActionRequest, ActionResult};

/// 派发失败的原因，最终以字符串写入 ActionResult.error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error("Unknown capability kind '{kind}' (available: {available})")]
    UnknownKind { kind: String, available: String },

    #[error("{0}")]
    Handler(String),

    #[error("Capability panicked: {0}")]
    Panicked(String),

    #[error("Timed out after {0:?}")]
    TimedOut(Duration),
}

/// 动作执行器：能力表在构建时固定
pub struct ActionRunner {
    registry: CapabilityRegistry,
    context: RuntimeContext,
    timeout: Option<Duration>,
}

impl ActionRunner {
    pub fn new(registry: CapabilityRegistry, context: RuntimeContext) -> Self {
        Self {
            registry,
            context,
            timeout: None,
        }
    }

    /// 单次动作超时；0 表示不限制
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn capabilities(&self) -> Vec<CapabilityInfo> {
        self.registry.describe()
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    /// 执行一个请求；永不失败
    pub async fn run_task(&self, request: &ActionRequest) -> ActionResult {
        let start = Instant::now();
        let outcome = self.dispatch(request).await;

        let (ok, label) = match &outcome {
            Ok(_) => (true, "ok"),
            Err(RunError::UnknownKind { .. }) => (false, "unknown_kind"),
            Err(RunError::Handler(_)) => (false, "error"),
            Err(RunError::Panicked(_)) => (false, "panic"),
            Err(RunError::TimedOut(_)) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "action_audit",
            "id": request.id,
            "kind": request.kind,
            "ok": ok,
            "outcome": label,
            "duration_ms": start.elapsed().as_millis() as u64,
            "params_preview": params_preview(&request.params),
        });
        tracing::info!(audit = %audit.to_string(), "action");

        match outcome {
            Ok(output) => ActionResult::ok(request.id.clone(), output),
            Err(e) => ActionResult::error(request.id.clone(), e.to_string()),
        }
    }

    async fn dispatch(&self, request: &ActionRequest) -> Result<Value, RunError> {
        let capability = self
            .registry
            .get(&request.kind)
            .ok_or_else(|| RunError::UnknownKind {
                kind: request.kind.clone(),
                available: self.registry.kinds().join(", "),
            })?;

        let params = Value::Object(request.params.clone());
        let call = AssertUnwindSafe(capability.run(params, &self.context)).catch_unwind();
        let caught = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RunError::TimedOut(limit))?,
            None => call.await,
        };

        match caught {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(msg)) => Err(RunError::Handler(msg)),
            Err(panic) => Err(RunError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn params_preview(params: &serde_json::Map<String, Value>) -> String {
    let s = Value::Object(params.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, EchoCapability};
    use crate::directive::ActionStatus;
    use async_trait::async_trait;
    use serde_json::json;

    struct Failing;

    #[async_trait]
    impl Capability for Failing {
        fn kind(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        async fn run(&self, _params: Value, _ctx: &RuntimeContext) -> Result<Value, String> {
            Err("upstream returned 503".to_string())
        }
    }

    struct Panicking;

    #[async_trait]
    impl Capability for Panicking {
        fn kind(&self) -> &str {
            "panic"
        }
        fn description(&self) -> &str {
            "panics"
        }
        async fn run(&self, _params: Value, _ctx: &RuntimeContext) -> Result<Value, String> {
            panic!("handler exploded");
        }
    }

    struct Slow;

    #[async_trait]
    impl Capability for Slow {
        fn kind(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps for a long time"
        }
        async fn run(&self, _params: Value, _ctx: &RuntimeContext) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Value::Null)
        }
    }

    fn runner() -> ActionRunner {
        let mut registry = CapabilityRegistry::new();
        registry.register(EchoCapability);
        registry.register(Failing);
        registry.register(Panicking);
        registry.register(Slow);
        ActionRunner::new(registry, RuntimeContext::offline())
    }

    #[tokio::test]
    async fn test_success_sets_output() {
        let req = ActionRequest::new("a", "echo").with_params(json!({"text": "hi"}));
        let result = runner().run_task(&req).await;
        assert_eq!(result.id, "a");
        assert_eq!(result.status, ActionStatus::Ok);
        assert_eq!(result.output, Some(json!("hi")));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_unknown_kind_is_error_result() {
        let result = runner().run_task(&ActionRequest::new("a", "teleport")).await;
        assert_eq!(result.status, ActionStatus::Error);
        let msg = result.error.unwrap();
        assert!(msg.contains("teleport"));
        assert!(msg.contains("echo"));
    }

    #[tokio::test]
    async fn test_handler_error_is_stringified() {
        let result = runner().run_task(&ActionRequest::new("a", "fail")).await;
        assert_eq!(result.status, ActionStatus::Error);
        assert_eq!(result.error.as_deref(), Some("upstream returned 503"));
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let result = runner().run_task(&ActionRequest::new("a", "panic")).await;
        assert_eq!(result.status, ActionStatus::Error);
        assert!(result.error.unwrap().contains("handler exploded"));
    }

    #[tokio::test]
    async fn test_timeout_is_error_result() {
        let runner = runner().with_timeout(Duration::from_millis(50));
        let result = runner.run_task(&ActionRequest::new("a", "slow")).await;
        assert_eq!(result.status, ActionStatus::Error);
        assert!(result.error.unwrap().contains("Timed out"));
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let runner = runner().with_timeout_secs(0);
        assert!(runner.timeout.is_none());
    }
}
