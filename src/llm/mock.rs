//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 可预置脚本（依次返回的成功 / 失败结果）；脚本用完后回显对话中最后一行 `User:` 内容。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::Message;

#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序返回给定结果，用完后回到回显
    pub fn scripted(replies: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn last_user_line(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .flat_map(|m| m.content.lines().rev())
        .find_map(|line| line.trim().strip_prefix("User:"))
        .map(str::trim)
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        if let Some(reply) = next {
            return reply;
        }
        Ok(format!(
            "Mock reply to: {}",
            last_user_line(messages).unwrap_or("(no input)")
        ))
    }
}
