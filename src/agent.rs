//! 无界面会话运行时
//!
//! build_orchestrator 按配置装配 LLM、知识库与联网搜索；
//! ChatSession 持有一个会话的 ConversationHistory，每轮追加用户轮次、渲染对话、
//! 跑一次编排并追加助手轮次。编排器可在多个会话间共享。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::core::{ContextSource, LlmGenerator, Orchestrator, RunEvent};
use crate::llm::{create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{ConversationHistory, ConversationTurn, InMemoryKnowledgeStore};
use crate::providers::{ContextProvider, TavilySearch};

/// 降级生成也失败时展示给用户的文本
pub const APOLOGY: &str =
    "I'm sorry, I couldn't put together an answer just now. Please try asking again in a moment.";

/// 按配置与环境变量选择 LLM 后端；没有可用 Key 时使用 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    // 有 DeepSeek Key，或配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(
            Some(&model),
            cfg.llm.base_url.as_deref(),
        ))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}

/// 创建内存知识库；配置了 corpus_dir 时导入其中的语料
pub fn build_knowledge_store(cfg: &AppConfig) -> anyhow::Result<InMemoryKnowledgeStore> {
    let store = InMemoryKnowledgeStore::new(cfg.knowledge.top_k, cfg.knowledge.max_entries);
    if let Some(dir) = &cfg.knowledge.corpus_dir {
        store
            .load_dir(dir)
            .with_context(|| format!("Failed to load knowledge corpus from {}", dir.display()))?;
    }
    Ok(store)
}

/// 装配编排器：知识库始终接入，联网搜索仅在设置 TAVILY_API_KEY 时接入
pub fn build_orchestrator(cfg: &AppConfig) -> anyhow::Result<Orchestrator> {
    let store = build_knowledge_store(cfg)?;
    let mut provider = ContextProvider::new()
        .with_store(Arc::new(store))
        .with_store_timeout(Duration::from_secs(cfg.knowledge.timeout_secs))
        .with_search_timeout(Duration::from_secs(cfg.search.timeout_secs))
        .with_max_snippet_chars(cfg.search.max_result_chars);
    match TavilySearch::from_config(&cfg.search) {
        Some(search) => provider = provider.with_search(Arc::new(search)),
        None => tracing::warn!("TAVILY_API_KEY not set, web search disabled"),
    }

    let llm = create_llm_from_config(cfg);
    let generator = Arc::new(LlmGenerator::with_prompt_from_file(llm));
    let orchestrator = Orchestrator::new(provider, generator, cfg.orchestrator.clone())
        .with_generation_timeout(Duration::from_secs(cfg.llm.timeouts.request));
    tracing::info!(
        vector_store = orchestrator.config().vector_store_enabled,
        web_search = orchestrator.config().web_search_enabled,
        "orchestrator ready"
    );
    Ok(orchestrator)
}

/// 一轮对话的回复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub answer: String,
    pub context: String,
    pub context_source: ContextSource,
    /// 降级生成也失败，answer 为致歉文本
    pub failed: bool,
}

impl TurnReply {
    fn apology() -> Self {
        Self {
            answer: APOLOGY.to_string(),
            context: String::new(),
            context_source: ContextSource::None,
            failed: true,
        }
    }
}

/// 处理单条用户消息：追加用户轮次，对完整对话跑编排，成功则追加助手轮次
pub async fn process_message(
    orchestrator: &Orchestrator,
    history: &mut ConversationHistory,
    user_input: &str,
    event_tx: Option<&mpsc::UnboundedSender<RunEvent>>,
) -> TurnReply {
    history.push(ConversationTurn::user(user_input));
    let transcript = history.render_transcript();

    match orchestrator.run_with_events(&transcript, event_tx).await {
        Ok(result) => {
            history.push(ConversationTurn::assistant(
                result.answer.clone(),
                result.context.clone(),
                result.context_source,
            ));
            TurnReply {
                answer: result.answer,
                context: result.context,
                context_source: result.context_source,
                failed: false,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, turns = history.len(), "turn failed");
            TurnReply::apology()
        }
    }
}

/// 单个会话：独占一份对话历史，共享编排器
pub struct ChatSession {
    orchestrator: Arc<Orchestrator>,
    history: ConversationHistory,
}

impl ChatSession {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            history: ConversationHistory::new(),
        }
    }

    pub async fn ask(&mut self, user_input: &str) -> TurnReply {
        process_message(&self.orchestrator, &mut self.history, user_input, None).await
    }

    /// 同 ask，并把过程事件推送到 event_tx
    pub async fn ask_with_events(
        &mut self,
        user_input: &str,
        event_tx: &mpsc::UnboundedSender<RunEvent>,
    ) -> TurnReply {
        process_message(&self.orchestrator, &mut self.history, user_input, Some(event_tx)).await
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// 开始新的对话
    pub fn reset(&mut self) {
        self.history = ConversationHistory::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::memory::{Document, Speaker};

    fn session_with_mock(llm: MockLlmClient) -> (ChatSession, Arc<MockLlmClient>) {
        let llm = Arc::new(llm);
        let store = InMemoryKnowledgeStore::default();
        store.add(Document::new("Persistent headaches with fever need medical review"));
        let provider = ContextProvider::new().with_store(Arc::new(store));
        let generator = Arc::new(LlmGenerator::new(llm.clone(), "{question}\n--\n{context}"));
        let orchestrator = Orchestrator::new(provider, generator, OrchestratorConfig::default());
        (ChatSession::new(Arc::new(orchestrator)), llm)
    }

    #[tokio::test]
    async fn test_ask_appends_both_turns() {
        let (mut session, _) = session_with_mock(MockLlmClient::new());
        let reply = session.ask("I have headaches and a fever").await;

        assert!(!reply.failed);
        assert_eq!(reply.context_source, ContextSource::VectorStore);
        assert_eq!(session.history().len(), 2);
        let last = session.history().last().unwrap();
        assert_eq!(last.speaker(), Speaker::Assistant);
        assert_eq!(last.context_source(), Some(ContextSource::VectorStore));
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_user_turn_only() {
        let failures = (0..4).map(|_| Err("backend down".to_string()));
        let (mut session, llm) = session_with_mock(MockLlmClient::scripted(failures));
        let reply = session.ask("I have headaches and a fever").await;

        assert!(reply.failed);
        assert_eq!(reply.answer, APOLOGY);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().last().unwrap().speaker(), Speaker::User);
        // 3 次生成尝试 + 1 次降级
        assert_eq!(llm.calls(), 4);
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let (mut session, _) = session_with_mock(MockLlmClient::new());
        session.ask("hello").await;
        session.reset();
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_build_orchestrator_without_keys_uses_store_only() {
        std::env::remove_var("TAVILY_API_KEY");
        let orchestrator = build_orchestrator(&AppConfig::default()).unwrap();
        assert!(orchestrator.config().vector_store_enabled);
        assert!(!orchestrator.config().web_search_enabled);
    }

    #[test]
    fn test_build_knowledge_store_missing_dir_is_error() {
        let mut cfg = AppConfig::default();
        cfg.knowledge.corpus_dir = Some("/nonexistent/medassist-corpus".into());
        assert!(build_knowledge_store(&cfg).is_err());
    }
}
