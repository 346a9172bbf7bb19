//! callApi 能力：通过 RuntimeContext 的 HTTP 能力发起请求
//!
//! 自身不做网络 I/O；超时、UA、域名白名单由上下文中的 HttpFetch 实现决定。
//! 非 2xx 状态视为失败，错误信息带状态码与响应体预览。

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::capability::{Capability, FetchRequest, RuntimeContext};

const ERROR_BODY_PREVIEW_CHARS: usize = 300;

pub struct CallApiCapability;

#[async_trait]
impl Capability for CallApiCapability {
    fn kind(&self) -> &str {
        "callApi"
    }

    fn description(&self) -> &str {
        "Call an HTTP API and return its status and body (JSON when the response is JSON)."
    }

    fn signature(&self) -> &str {
        "params: {\"url\": string, \"method\"?: string, \"headers\"?: object, \"body\"?: any} -> {\"status\": number, \"body\": any}"
    }

    async fn run(&self, params: Value, ctx: &RuntimeContext) -> Result<Value, String> {
        let request: FetchRequest =
            serde_json::from_value(params).map_err(|e| format!("Invalid params: {e}"))?;
        if request.url.trim().is_empty() {
            return Err("Missing url".to_string());
        }
        tracing::info!(url = %request.url, method = %request.method, "callApi");

        let resp = ctx.http().fetch(request).await?;
        if !(200..300).contains(&resp.status) {
            let preview: String = resp
                .body
                .to_string()
                .chars()
                .take(ERROR_BODY_PREVIEW_CHARS)
                .collect();
            return Err(format!("HTTP {}: {}", resp.status, preview));
        }
        Ok(json!({ "status": resp.status, "body": resp.body }))
    }
}
