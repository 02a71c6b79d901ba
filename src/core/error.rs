//! 编排错误类型
//!
//! - ProviderError：知识库 / 联网搜索后端失败，可在编排层改道
//! - GenerationError：生成调用失败，消耗一次尝试后重新路由
//! - FallbackReason：进入 FallbackDone 的原因
//! - OrchestratorError：唯一会抛给调用方的错误（降级生成也失败）

use thiserror::Error;

use crate::providers::ProviderKind;

/// 上下文来源后端失败（传输层错误、超时、未配置）；形态不稳定不算错误，由归一化吸收
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    Unavailable(ProviderKind),

    #[error("{kind} timed out after {millis}ms")]
    Timeout { kind: ProviderKind, millis: u64 },

    #[error("{kind} backend failed: {reason}")]
    Backend { kind: ProviderKind, reason: String },
}

impl ProviderError {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderError::Unavailable(kind) => *kind,
            ProviderError::Timeout { kind, .. } | ProviderError::Backend { kind, .. } => *kind,
        }
    }
}

/// 生成调用失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("LLM error: {0}")]
    Backend(String),

    #[error("Generation timed out after {0}ms")]
    Timeout(u64),

    #[error("Generation returned an empty response")]
    EmptyResponse,

    /// 已达生成次数上限，拒绝再次调用
    #[error("Generation attempt ceiling reached ({0})")]
    AttemptsExhausted(u32),
}

/// 进入降级路径的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    #[error("generation attempts exhausted after {attempts} attempt(s)")]
    ExhaustedAttempts { attempts: u32 },

    #[error("step ceiling of {steps} reached")]
    StepCeiling { steps: u32 },

    #[error("unexpected failure: {0}")]
    Panic(String),
}

/// 对调用方可见的错误：降级生成本身也失败，本轮无回答
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Fallback generation failed ({reason}): {source}")]
    FallbackFailure {
        reason: FallbackReason,
        #[source]
        source: GenerationError,
    },
}
