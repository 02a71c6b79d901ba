//! 错误恢复引擎
//!
//! 将 ProviderError / GenerationError 映射为 RecoveryAction，供编排器决定重新路由还是降级。

use crate::core::{FallbackReason, GenerationError, ProviderError};

/// 恢复动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 重新询问路由策略（换来源、重试生成或 Fail）
    Reroute,
    /// 直接进入降级路径
    Fallback(FallbackReason),
}

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 来源失败：该来源已标记为尝试过，交给路由选择下一个来源
    pub fn on_provider_error(&self, err: &ProviderError) -> RecoveryAction {
        match err {
            ProviderError::Unavailable(_)
            | ProviderError::Timeout { .. }
            | ProviderError::Backend { .. } => RecoveryAction::Reroute,
        }
    }

    /// 生成失败：尝试已消耗，未到上限时重新路由；被上限拒绝则降级
    pub fn on_generation_error(&self, err: &GenerationError) -> RecoveryAction {
        match err {
            GenerationError::AttemptsExhausted(attempts) => {
                RecoveryAction::Fallback(FallbackReason::ExhaustedAttempts { attempts: *attempts })
            }
            GenerationError::Backend(_)
            | GenerationError::Timeout(_)
            | GenerationError::EmptyResponse => RecoveryAction::Reroute,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderKind;

    #[test]
    fn test_provider_errors_reroute() {
        let engine = RecoveryEngine::new();
        let errors = [
            ProviderError::Unavailable(ProviderKind::VectorStore),
            ProviderError::Timeout {
                kind: ProviderKind::WebSearch,
                millis: 100,
            },
            ProviderError::Backend {
                kind: ProviderKind::WebSearch,
                reason: "HTTP 500".into(),
            },
        ];
        for err in &errors {
            assert_eq!(engine.on_provider_error(err), RecoveryAction::Reroute);
        }
    }

    #[test]
    fn test_generation_failure_reroutes() {
        let engine = RecoveryEngine::new();
        let action = engine.on_generation_error(&GenerationError::Backend("503".into()));
        assert_eq!(action, RecoveryAction::Reroute);
        let action = engine.on_generation_error(&GenerationError::EmptyResponse);
        assert_eq!(action, RecoveryAction::Reroute);
    }

    #[test]
    fn test_exhausted_falls_back() {
        let engine = RecoveryEngine::new();
        let action = engine.on_generation_error(&GenerationError::AttemptsExhausted(3));
        assert_eq!(
            action,
            RecoveryAction::Fallback(FallbackReason::ExhaustedAttempts { attempts: 3 })
        );
    }
}
