//! 记忆层：会话历史（只追加）与知识库检索

pub mod conversation;
pub mod knowledge;

pub use conversation::{ConversationHistory, ConversationTurn, Message, Role, Speaker};
pub use knowledge::{Document, InMemoryKnowledgeStore, KnowledgeStore};
