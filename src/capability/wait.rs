//! wait 能力：通过 RuntimeContext 的 Sleeper 延时

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::capability::{Capability, RuntimeContext};

/// 单次等待上限，避免生成器请求过长的延时
const MAX_WAIT_MS: u64 = 60_000;

pub struct WaitCapability;

#[async_trait]
impl Capability for WaitCapability {
    fn kind(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Wait for the given number of milliseconds (max 60000)."
    }

    fn signature(&self) -> &str {
        "params: {\"ms\": number} -> {\"waitedMs\": number}"
    }

    async fn run(&self, params: Value, ctx: &RuntimeContext) -> Result<Value, String> {
        let ms = params
            .get("ms")
            .and_then(Value::as_u64)
            .ok_or_else(|| "Missing or invalid ms".to_string())?;
        if ms > MAX_WAIT_MS {
            return Err(format!("ms must be at most {MAX_WAIT_MS}"));
        }
        ctx.sleeper().sleep(Duration::from_millis(ms)).await;
        Ok(json!({ "waitedMs": ms }))
    }
}
