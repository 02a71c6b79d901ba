//! Generation Step：调用生成协作者得到候选回答
//!
//! Generator 是不透明的 generate(question, context) -> answer；
//! GenerationStep 负责计数、上限检查、超时与空回答判定，不在内部重试。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::core::{GenerationError, RunState};
use crate::llm::LlmClient;
use crate::memory::Message;

/// 内置提示模板（找不到 config/prompts/generation.txt 时使用）
pub const DEFAULT_GENERATION_PROMPT: &str = "You are a careful, empathetic medical and mental health assistant. \
You are not a substitute for an in-person clinician.\n\n\
If the conversation does not yet give enough detail for safe, personalized guidance, ask a few specific follow-up questions. \
Otherwise summarize what you know and give practical guidance. \
For emergencies or thoughts of self-harm, urge the person to contact emergency services right away.\n\n\
Conversation so far:\n{question}\n\n\
Background context (may be empty):\n{context}";

const NEXT_MESSAGE_INSTRUCTION: &str = "Write your next message to the user.";

/// 生成协作者
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String, GenerationError>;
}

/// 基于 LlmClient 的生成器：模板渲染为 system 消息，再追加一条指令消息
pub struct LlmGenerator {
    llm: Arc<dyn LlmClient>,
    template: String,
}

impl LlmGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, template: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
        }
    }

    /// 从 config/prompts/generation.txt 加载模板，找不到时用内置模板
    pub fn with_prompt_from_file(llm: Arc<dyn LlmClient>) -> Self {
        let template = [
            "config/prompts/generation.txt",
            "../config/prompts/generation.txt",
        ]
        .into_iter()
        .find_map(|p| std::fs::read_to_string(p).ok())
        .unwrap_or_else(|| DEFAULT_GENERATION_PROMPT.to_string());
        Self::new(llm, template)
    }

    pub fn render_prompt(&self, question: &str, context: &str) -> String {
        let context = if context.trim().is_empty() {
            "(none)"
        } else {
            context
        };
        // 单遍替换：已填入的内容不再被扫描
        let mut out = String::with_capacity(self.template.len() + question.len() + context.len());
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix("{question}") {
                out.push_str(question);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{context}") {
                out.push_str(context);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String, GenerationError> {
        let messages = [
            Message::system(self.render_prompt(question, context)),
            Message::user(NEXT_MESSAGE_INSTRUCTION),
        ];
        let answer = self
            .llm
            .complete(&messages)
            .await
            .map_err(GenerationError::Backend)?;
        let (prompt_tokens, completion_tokens, total_tokens) = self.llm.token_usage();
        tracing::debug!(prompt_tokens, completion_tokens, total_tokens, "llm token usage");
        Ok(answer)
    }
}

/// 生成步骤：包装 Generator，施加超时并维护 RunState 的尝试计数
pub struct GenerationStep {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl GenerationStep {
    pub fn new(generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 先计数再调用（失败也消耗一次）；已到上限时拒绝调用。成功则写入 state.generation
    pub async fn run(&self, state: &mut RunState, ceiling: u32) -> Result<(), GenerationError> {
        if state.generation_attempts() >= ceiling {
            return Err(GenerationError::AttemptsExhausted(ceiling));
        }
        let attempt = state.begin_generation_attempt();
        tracing::debug!(attempt, ceiling, context_chars = state.context().len(), "generating");

        let answer = self.call(state.question(), state.context()).await?;
        state.set_generation(answer);
        Ok(())
    }

    /// 降级路径：空上下文直接生成，不计入尝试次数
    pub async fn direct(&self, question: &str) -> Result<String, GenerationError> {
        self.call(question, "").await
    }

    async fn call(&self, question: &str, context: &str) -> Result<String, GenerationError> {
        let answer = timeout(self.timeout, self.generator.generate(question, context))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout.as_millis() as u64))??;
        if answer.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(answer)
    }
}
