//! 联网搜索：WebSearch trait 与 Tavily 实现
//!
//! search 返回原始 JSON（形态不稳定），由 ContextProvider 负责归一化。
//! Tavily 响应若含 results 字段则只返回该字段，否则返回整个响应体。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::SearchSection;

pub const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// 搜索协作者：query -> 原始 JSON
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Value, String>;
}

/// Tavily 搜索 API 客户端
pub struct TavilySearch {
    client: Client,
    endpoint: String,
    api_key: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        max_results: usize,
        timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            max_results,
        }
    }

    /// 从配置与环境变量 `TAVILY_API_KEY` 创建；未设置 Key 时返回 None
    pub fn from_config(cfg: &SearchSection) -> Option<Self> {
        let api_key = std::env::var("TAVILY_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self::new(
            cfg.endpoint.clone(),
            api_key,
            cfg.max_results,
            cfg.timeout_secs,
        ))
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<Value, String> {
        tracing::info!(query_chars = query.chars().count(), "tavily search");
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": self.max_results,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let payload: Value = resp
            .json()
            .await
            .map_err(|e| format!("Read body: {}", e))?;

        Ok(match payload {
            Value::Object(mut map) => match map.remove("results") {
                Some(results) => results,
                None => Value::Object(map),
            },
            other => other,
        })
    }
}
