//! 会话集成测试：多轮对话、致歉与失败后继续

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use medassist::agent::APOLOGY;
    use medassist::config::{load_config, OrchestratorConfig};
    use medassist::core::{ContextSource, LlmGenerator, Orchestrator};
    use medassist::llm::MockLlmClient;
    use medassist::memory::{InMemoryKnowledgeStore, Speaker};
    use medassist::providers::ContextProvider;
    use medassist::ChatSession;

    fn session(llm: Arc<MockLlmClient>, store: InMemoryKnowledgeStore) -> ChatSession {
        let provider = ContextProvider::new().with_store(Arc::new(store));
        let generator = Arc::new(LlmGenerator::new(llm, "{question}\n\nContext:\n{context}"));
        let orchestrator = Orchestrator::new(provider, generator, OrchestratorConfig::default());
        ChatSession::new(Arc::new(orchestrator))
    }

    #[tokio::test]
    async fn test_multi_turn_transcript_reaches_generator() {
        let llm = Arc::new(MockLlmClient::new());
        let mut session = session(llm.clone(), InMemoryKnowledgeStore::default());

        let first = session.ask("I can't sleep").await;
        assert_eq!(first.answer, "Mock reply to: I can't sleep");
        assert_eq!(first.context_source, ContextSource::None);

        let second = session.ask("About two weeks now").await;
        assert_eq!(second.answer, "Mock reply to: About two weeks now");

        let speakers: Vec<_> = session.history().turns().iter().map(|t| t.speaker()).collect();
        assert_eq!(
            speakers,
            vec![Speaker::User, Speaker::Assistant, Speaker::User, Speaker::Assistant]
        );
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_apology_then_next_turn_proceeds() {
        let failures = (0..4).map(|_| Err("service unavailable".to_string()));
        let llm = Arc::new(MockLlmClient::scripted(failures));
        let mut session = session(llm, InMemoryKnowledgeStore::default());

        let failed = session.ask("My chest feels tight").await;
        assert!(failed.failed);
        assert_eq!(failed.answer, APOLOGY);
        assert_eq!(session.history().len(), 1);

        // 脚本用完后恢复正常
        let next = session.ask("It started an hour ago").await;
        assert!(!next.failed);
        assert_eq!(next.answer, "Mock reply to: It started an hour ago");
        assert_eq!(session.history().len(), 3);
        let turns = session.history().turns();
        assert_eq!(turns[0].speaker(), Speaker::User);
        assert_eq!(turns[1].speaker(), Speaker::User);
        assert_eq!(turns[2].speaker(), Speaker::Assistant);
    }

    #[tokio::test]
    async fn test_corpus_dir_provides_context() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("anxiety.txt"),
            "Panic attacks often peak within ten minutes.\n\nSlow breathing can ease panic symptoms.",
        )
        .unwrap();
        let store = InMemoryKnowledgeStore::default();
        store.load_dir(dir.path()).unwrap();

        let mut session = session(Arc::new(MockLlmClient::new()), store);
        let reply = session.ask("I think I had panic attacks").await;

        assert_eq!(reply.context_source, ContextSource::VectorStore);
        assert!(reply.context.contains("Panic attacks often peak"));
        let last = session.history().last().unwrap();
        assert_eq!(last.context_source(), Some(ContextSource::VectorStore));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let llm = Arc::new(MockLlmClient::new());
        let provider = ContextProvider::new();
        let generator = Arc::new(LlmGenerator::new(llm, "{question}"));
        let orchestrator = Arc::new(Orchestrator::new(
            provider,
            generator,
            OrchestratorConfig::default(),
        ));

        let mut a = ChatSession::new(orchestrator.clone());
        let mut b = ChatSession::new(orchestrator);
        a.ask("headache").await;
        a.ask("since yesterday").await;
        b.ask("back pain").await;

        assert_eq!(a.history().len(), 4);
        assert_eq!(b.history().len(), 2);
        assert!(!b.history().render_transcript().contains("headache"));
    }

    #[test]
    fn test_config_file_drives_ceilings() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("medassist.toml");
        std::fs::write(&path, "[orchestrator]\nstep_ceiling = 9\n").unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.orchestrator.step_ceiling, 9);
        assert_eq!(cfg.orchestrator.generation_attempt_ceiling, 3);
    }
}
