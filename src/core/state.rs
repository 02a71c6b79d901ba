//! 单轮编排状态：RunState、上下文来源与编排阶段
//!
//! RunState 只属于一次编排调用；documents 变化时 context 总是重新拼接，
//! generation 至多写入一次，进入终态（Done / FallbackDone）后不再变化。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::providers::ProviderKind;

/// documents 拼接为 context 时使用的分隔符（空行）
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// 上下文来源（展示给用户）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextSource {
    VectorStore,
    WebSearch,
    #[default]
    None,
}

impl ContextSource {
    pub fn label(&self) -> &'static str {
        match self {
            ContextSource::VectorStore => "Vector Store",
            ContextSource::WebSearch => "Web Search",
            ContextSource::None => "None",
        }
    }
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 编排阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Retrieving,
    Generating,
    Done,
    FallbackDone,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::FallbackDone)
    }
}

/// 本轮已尝试过的来源
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourcesTried {
    pub vector_store: bool,
    pub web_search: bool,
}

impl SourcesTried {
    pub fn contains(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::VectorStore => self.vector_store,
            ProviderKind::WebSearch => self.web_search,
        }
    }
}

/// 一次编排调用（一个用户轮次）的可变状态
#[derive(Clone, Debug)]
pub struct RunState {
    question: String,
    documents: Vec<String>,
    context: String,
    context_source: ContextSource,
    generation_attempts: u32,
    generation: Option<String>,
    tried: SourcesTried,
    phase: Phase,
    steps: u32,
}

impl RunState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            documents: Vec::new(),
            context: String::new(),
            context_source: ContextSource::None,
            generation_attempts: 0,
            generation: None,
            tried: SourcesTried::default(),
            phase: Phase::Start,
            steps: 0,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn context_source(&self) -> ContextSource {
        self.context_source
    }

    pub fn generation_attempts(&self) -> u32 {
        self.generation_attempts
    }

    pub fn generation(&self) -> Option<&str> {
        self.generation.as_deref()
    }

    pub fn tried(&self) -> SourcesTried {
        self.tried
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// 追加某来源返回的片段并重算 context；空片段不改变 documents 与来源
    pub(crate) fn extend_documents(&mut self, source: ContextSource, snippets: Vec<String>) {
        if self.is_terminal() || snippets.is_empty() {
            return;
        }
        self.documents.extend(snippets);
        self.context = self.documents.join(CONTEXT_SEPARATOR);
        self.context_source = source;
    }

    pub(crate) fn mark_tried(&mut self, kind: ProviderKind) {
        match kind {
            ProviderKind::VectorStore => self.tried.vector_store = true,
            ProviderKind::WebSearch => self.tried.web_search = true,
        }
    }

    /// 调用生成前计数，返回本次是第几次
    pub(crate) fn begin_generation_attempt(&mut self) -> u32 {
        self.generation_attempts += 1;
        self.generation_attempts
    }

    /// 写入最终回答；已有回答或已终止时返回 false
    pub(crate) fn set_generation(&mut self, answer: String) -> bool {
        if self.generation.is_some() || self.is_terminal() {
            return false;
        }
        self.generation = Some(answer);
        true
    }

    pub(crate) fn record_step(&mut self) -> u32 {
        self.steps += 1;
        self.steps
    }

    /// 切换阶段；终态之后拒绝任何切换，返回原阶段
    pub(crate) fn enter(&mut self, to: Phase) -> Option<Phase> {
        if self.is_terminal() {
            return None;
        }
        let from = self.phase;
        self.phase = to;
        Some(from)
    }
}
