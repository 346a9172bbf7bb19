//! Echo 能力（测试用）

use async_trait::async_trait;
use serde_json::Value;

use crate::capability::{Capability, RuntimeContext};

/// 回显 params.text；无 text 时回显整个 params
pub struct EchoCapability;

#[async_trait]
impl Capability for EchoCapability {
    fn kind(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back (for testing)."
    }

    fn signature(&self) -> &str {
        "params: {\"text\": string} -> string"
    }

    async fn run(&self, params: Value, _ctx: &RuntimeContext) -> Result<Value, String> {
        match params.get("text") {
            Some(text) => Ok(text.clone()),
            None => Ok(params),
        }
    }
}
