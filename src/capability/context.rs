//! 运行时上下文：传给每次能力调用的只读依赖
//!
//! 最少包含 HTTP 抓取与延时两种能力，均为 trait 对象，宿主可替换以做沙箱或测试。
//! 默认实现：ReqwestFetcher（带超时、UA 与可选域名白名单）与 TokioSleeper。

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RuntimeSection;

/// 一次 HTTP 请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

/// HTTP 响应；body 若能解析为 JSON 则为 JSON，否则为字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Value,
}

/// 类 fetch 能力
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, String>;
}

/// 延时能力
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// 共享只读运行时上下文
#[derive(Clone)]
pub struct RuntimeContext {
    http: Arc<dyn HttpFetch>,
    sleeper: Arc<dyn Sleeper>,
}

impl RuntimeContext {
    pub fn new(http: Arc<dyn HttpFetch>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { http, sleeper }
    }

    /// 按 [runtime] 配置构建默认上下文
    pub fn from_config(cfg: &RuntimeSection) -> Self {
        Self::new(
            Arc::new(ReqwestFetcher::new(cfg)),
            Arc::new(TokioSleeper),
        )
    }

    /// 禁止网络的上下文（HTTP 调用一律失败）
    pub fn offline() -> Self {
        Self::new(Arc::new(DisabledFetch), Arc::new(TokioSleeper))
    }

    pub fn http(&self) -> &dyn HttpFetch {
        self.http.as_ref()
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::from_config(&RuntimeSection::default())
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext").finish_non_exhaustive()
    }
}

/// tokio::time::sleep
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 拒绝所有请求
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledFetch;

#[async_trait]
impl HttpFetch for DisabledFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, String> {
        Err(format!("Network access disabled: {}", request.url))
    }
}

/// reqwest 实现：超时、User-Agent、可选域名白名单（空表示不限制）
pub struct ReqwestFetcher {
    client: Client,
    allowed_hosts: HashSet<String>,
}

impl ReqwestFetcher {
    pub fn new(cfg: &RuntimeSection) -> Self {
        let client = build_client(cfg).unwrap_or_else(|e| {
            tracing::warn!(
                "HTTP client config rejected ({}); falling back to defaults without timeout and User-Agent",
                e
            );
            Client::default()
        });
        Self {
            client,
            allowed_hosts: cfg
                .allowed_hosts
                .iter()
                .map(|h| h.to_lowercase())
                .collect(),
        }
    }

    fn check_host(&self, url: &reqwest::Url) -> Result<(), String> {
        if self.allowed_hosts.is_empty() {
            return Ok(());
        }
        let host = url
            .host_str()
            .map(str::to_lowercase)
            .ok_or_else(|| format!("URL has no host: {url}"))?;
        if self.allowed_hosts.contains(&host) {
            Ok(())
        } else {
            Err(format!("Host not in allowlist: {host}"))
        }
    }
}

fn build_client(cfg: &RuntimeSection) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(cfg.http_timeout_secs))
        .user_agent(cfg.user_agent.clone())
        .build()
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, String> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| format!("Invalid URL: {e}"))?;
        self.check_host(&url)?;
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|e| format!("Invalid method {}: {e}", request.method))?;

        let mut builder = self.client.request(method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| format!("Request failed: {e}"))?;
        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("Read body: {e}"))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(FetchResponse { status, body })
    }
}
