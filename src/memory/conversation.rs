//! 对话记录
//!
//! - Message / Role：发给 LLM 的消息格式
//! - ConversationTurn / ConversationHistory：一个会话的完整轮次，只追加、不重排、不裁剪；
//!   render_transcript 按顺序渲染为 `User:` / `Assistant:` 交替行，作为编排输入。

use serde::{Deserialize, Serialize};

use crate::core::ContextSource;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条 LLM 消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 轮次说话方
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Assistant => "Assistant",
        }
    }
}

/// 单个对话轮次；追加进 ConversationHistory 后只读
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
    speaker: Speaker,
    content: String,
    context: Option<String>,
    context_source: Option<ContextSource>,
    /// 创建时间（毫秒时间戳）
    created_at: i64,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            content: content.into(),
            context: None,
            context_source: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// 助手回答；空 context 与 ContextSource::None 不记录
    pub fn assistant(
        content: impl Into<String>,
        context: impl Into<String>,
        context_source: ContextSource,
    ) -> Self {
        let context = context.into();
        Self {
            speaker: Speaker::Assistant,
            content: content.into(),
            context: (!context.is_empty()).then_some(context),
            context_source: (context_source != ContextSource::None).then_some(context_source),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn context_source(&self) -> Option<ContextSource> {
        self.context_source
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}

/// 会话历史：只追加
#[derive(Clone, Debug, Default)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// 按顺序渲染为 "User: ..." / "Assistant: ..." 行
    pub fn render_transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.speaker.label(), t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_transcript_in_order() {
        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::user("I can't sleep"));
        history.push(ConversationTurn::assistant(
            "How long has this been going on?",
            "",
            ContextSource::None,
        ));
        history.push(ConversationTurn::user("About two weeks"));

        assert_eq!(
            history.render_transcript(),
            "User: I can't sleep\nAssistant: How long has this been going on?\nUser: About two weeks"
        );
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_empty_history_renders_empty() {
        let history = ConversationHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.render_transcript(), "");
    }

    #[test]
    fn test_assistant_turn_provenance() {
        let turn = ConversationTurn::assistant("answer", "note", ContextSource::VectorStore);
        assert_eq!(turn.speaker(), Speaker::Assistant);
        assert_eq!(turn.context(), Some("note"));
        assert_eq!(turn.context_source(), Some(ContextSource::VectorStore));

        let bare = ConversationTurn::assistant("answer", "", ContextSource::None);
        assert!(bare.context().is_none());
        assert!(bare.context_source().is_none());
    }
}
