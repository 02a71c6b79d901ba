//! 上下文提供者：统一封装知识库检索与联网搜索
//!
//! fetch(kind, query) 在超时内调用对应后端，归一化为有序文本片段与来源标签；
//! 超时、后端报错、未配置转为 ProviderError；每次调用输出一行 JSON 审计日志。

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::timeout;

use crate::core::{ContextSource, ProviderError};
use crate::memory::KnowledgeStore;
use crate::providers::{normalize_search_results, WebSearch};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MAX_SNIPPET_CHARS: usize = 4000;

/// 上下文来源种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    VectorStore,
    WebSearch,
}

impl ProviderKind {
    pub fn source(self) -> ContextSource {
        match self {
            ProviderKind::VectorStore => ContextSource::VectorStore,
            ProviderKind::WebSearch => ContextSource::WebSearch,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::VectorStore => f.write_str("vector store"),
            ProviderKind::WebSearch => f.write_str("web search"),
        }
    }
}

/// 一次 fetch 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub snippets: Vec<String>,
    pub source: ContextSource,
}

impl Fetched {
    pub fn source_label(&self) -> &'static str {
        self.source.label()
    }
}

/// 上下文提供者：持有可选的知识库与搜索后端
pub struct ContextProvider {
    store: Option<Arc<dyn KnowledgeStore>>,
    search: Option<Arc<dyn WebSearch>>,
    store_timeout: Duration,
    search_timeout: Duration,
    max_snippet_chars: usize,
}

impl Default for ContextProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProvider {
    pub fn new() -> Self {
        Self {
            store: None,
            search: None,
            store_timeout: DEFAULT_TIMEOUT,
            search_timeout: DEFAULT_TIMEOUT,
            max_snippet_chars: DEFAULT_MAX_SNIPPET_CHARS,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KnowledgeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    /// 单条搜索片段最大字符数，超出截断并追加 ...[truncated]
    pub fn with_max_snippet_chars(mut self, max: usize) -> Self {
        self.max_snippet_chars = max;
        self
    }

    pub fn has(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::VectorStore => self.store.is_some(),
            ProviderKind::WebSearch => self.search.is_some(),
        }
    }

    /// 调用指定来源并归一化；空白片段被丢弃
    pub async fn fetch(&self, kind: ProviderKind, query: &str) -> Result<Fetched, ProviderError> {
        let start = Instant::now();
        let result = match kind {
            ProviderKind::VectorStore => self.fetch_store(query).await,
            ProviderKind::WebSearch => self.fetch_search(query).await,
        };

        let (ok, outcome, snippets) = match &result {
            Ok(s) => (true, "ok", s.len()),
            Err(ProviderError::Unavailable(_)) => (false, "unavailable", 0),
            Err(ProviderError::Timeout { .. }) => (false, "timeout", 0),
            Err(ProviderError::Backend { .. }) => (false, "error", 0),
        };
        let audit = serde_json::json!({
            "event": "context_fetch",
            "kind": kind,
            "ok": ok,
            "outcome": outcome,
            "snippets": snippets,
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        tracing::info!(audit = %audit, "context provider");

        result.map(|snippets| Fetched {
            snippets,
            source: kind.source(),
        })
    }

    async fn fetch_store(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        let kind = ProviderKind::VectorStore;
        let store = self.store.as_ref().ok_or(ProviderError::Unavailable(kind))?;
        let documents = timeout(self.store_timeout, store.retrieve(query))
            .await
            .map_err(|_| ProviderError::Timeout {
                kind,
                millis: self.store_timeout.as_millis() as u64,
            })?
            .map_err(|reason| ProviderError::Backend { kind, reason })?;

        Ok(documents
            .into_iter()
            .map(|d| d.text)
            .filter(|t| !t.trim().is_empty())
            .collect())
    }

    async fn fetch_search(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        let kind = ProviderKind::WebSearch;
        let search = self.search.as_ref().ok_or(ProviderError::Unavailable(kind))?;
        let raw = timeout(self.search_timeout, search.search(query))
            .await
            .map_err(|_| ProviderError::Timeout {
                kind,
                millis: self.search_timeout.as_millis() as u64,
            })?
            .map_err(|reason| ProviderError::Backend { kind, reason })?;

        Ok(normalize_search_results(raw)
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| truncate_chars(s, self.max_snippet_chars))
            .collect())
    }
}

fn truncate_chars(s: String, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect::<String>() + "\n...[truncated]"
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Document;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct StaticStore(Vec<&'static str>);

    #[async_trait]
    impl KnowledgeStore for StaticStore {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Document>, String> {
            Ok(self.0.iter().map(|t| Document::new(*t)).collect())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl KnowledgeStore for FailingStore {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Document>, String> {
            Err("connection refused".to_string())
        }
    }

    struct SlowSearch;

    #[async_trait]
    impl WebSearch for SlowSearch {
        async fn search(&self, _query: &str) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(json!([]))
        }
    }

    struct StaticSearch(Value);

    #[async_trait]
    impl WebSearch for StaticSearch {
        async fn search(&self, _query: &str) -> Result<Value, String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_store_documents_to_text() {
        let provider = ContextProvider::new()
            .with_store(Arc::new(StaticStore(vec!["Clinical note A", "  ", "Clinical note B"])));
        let fetched = provider.fetch(ProviderKind::VectorStore, "q").await.unwrap();
        assert_eq!(fetched.snippets, vec!["Clinical note A", "Clinical note B"]);
        assert_eq!(fetched.source, ContextSource::VectorStore);
        assert_eq!(fetched.source_label(), "Vector Store");
    }

    #[tokio::test]
    async fn test_unconfigured_source_is_unavailable() {
        let provider = ContextProvider::new();
        let err = provider.fetch(ProviderKind::WebSearch, "q").await.unwrap_err();
        assert_eq!(err, ProviderError::Unavailable(ProviderKind::WebSearch));
        assert!(!provider.has(ProviderKind::VectorStore));
    }

    #[tokio::test]
    async fn test_backend_error_surfaces() {
        let provider = ContextProvider::new().with_store(Arc::new(FailingStore));
        let err = provider.fetch(ProviderKind::VectorStore, "q").await.unwrap_err();
        assert!(matches!(err, ProviderError::Backend { kind: ProviderKind::VectorStore, .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_search_timeout() {
        let provider = ContextProvider::new()
            .with_search(Arc::new(SlowSearch))
            .with_search_timeout(Duration::from_millis(20));
        let err = provider.fetch(ProviderKind::WebSearch, "q").await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::Timeout {
                kind: ProviderKind::WebSearch,
                millis: 20
            }
        );
    }

    #[tokio::test]
    async fn test_search_shapes_never_fail() {
        let shapes = vec![
            json!([{"content": "a"}, {"content": "b"}]),
            json!(["x", 1, false]),
            json!({"content": "single"}),
            json!({"title": "no content"}),
            json!("bare string"),
        ];
        for shape in shapes {
            let provider =
                ContextProvider::new().with_search(Arc::new(StaticSearch(shape.clone())));
            let fetched = provider.fetch(ProviderKind::WebSearch, "q").await.unwrap();
            assert!(!fetched.snippets.is_empty(), "shape {shape} yielded nothing");
            assert_eq!(fetched.source, ContextSource::WebSearch);
        }
    }

    #[tokio::test]
    async fn test_search_snippets_truncated() {
        let long = "x".repeat(50);
        let provider = ContextProvider::new()
            .with_search(Arc::new(StaticSearch(json!([{ "content": long }]))))
            .with_max_snippet_chars(10);
        let fetched = provider.fetch(ProviderKind::WebSearch, "q").await.unwrap();
        assert_eq!(fetched.snippets[0], format!("{}\n...[truncated]", "x".repeat(10)));
    }
}
