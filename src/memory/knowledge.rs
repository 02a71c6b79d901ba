//! 知识库：检索协作者与内存实现
//!
//! KnowledgeStore::retrieve(query) 返回有序 Document；InMemoryKnowledgeStore 按关键词重叠打分，
//! 取 top_k，可从目录批量导入 .txt / .md（按空行切段，每段一个 Document）。
//! 后续可替换为真实向量库，只需实现同一 trait。

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 检索结果文档
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    /// 来源（文件名等），可选
    pub source: Option<String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// 检索协作者
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, String>;
}

type Entry = (Document, HashSet<String>);

/// 内存知识库：关键词重叠检索
#[derive(Clone)]
pub struct InMemoryKnowledgeStore {
    store: Arc<RwLock<Vec<Entry>>>,
    top_k: usize,
    max_entries: usize,
}

/// 对话渲染时的说话方标签，不参与查询打分
const SPEAKER_LABELS: [&str; 2] = ["User:", "Assistant:"];

/// 按非字母数字字符切分为小写词集合
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() > 2)
        .collect()
}

/// 查询分词：去掉每行开头的说话方标签
fn query_terms(query: &str) -> HashSet<String> {
    query
        .lines()
        .map(|line| {
            let line = line.trim_start();
            SPEAKER_LABELS
                .iter()
                .find_map(|label| line.strip_prefix(label))
                .unwrap_or(line)
        })
        .flat_map(tokenize_lower)
        .collect()
}

impl InMemoryKnowledgeStore {
    pub fn new(top_k: usize, max_entries: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(Vec::new())),
            top_k,
            max_entries,
        }
    }

    /// 存入一条文档，超出容量时丢弃最旧的
    pub fn add(&self, document: Document) {
        if document.text.trim().is_empty() {
            return;
        }
        let tokens = tokenize_lower(&document.text);
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.push((document, tokens));
        let n = store.len();
        if n > self.max_entries {
            store.drain(0..n - self.max_entries);
        }
    }

    pub fn len(&self) -> usize {
        self.store.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 导入目录下所有 .txt / .md 文件（按文件名排序），返回导入的段落数
    pub fn load_dir(&self, dir: &Path) -> anyhow::Result<usize> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("read corpus dir {}", dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("txt") | Some("md")
                    )
            })
            .collect();
        paths.sort();

        let mut added = 0;
        for path in paths {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("read corpus file {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
                self.add(Document::new(paragraph).with_source(name.clone()));
                added += 1;
            }
        }
        tracing::info!(dir = %dir.display(), paragraphs = added, "knowledge corpus loaded");
        Ok(added)
    }

    /// 同步检索：得分为查询词与文档词交集大小，得分为 0 的不返回；同分保持插入顺序
    pub fn search(&self, query: &str) -> Vec<Document> {
        let query_tokens = query_terms(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<(usize, &Document)> = store
            .iter()
            .map(|(doc, tokens)| (query_tokens.intersection(tokens).count(), doc))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new(4, 1000)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, String> {
        Ok(self.search(query))
    }
}
