//! 编排过程事件：用于流式展示每一步的路由、取数、生成与降级

use serde::Serialize;

use crate::core::{ContextSource, Phase, RouteDecision};

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// 步数更新（当前第几步）
    StepUpdate { step: u32, step_ceiling: u32 },
    PhaseChanged { from: Phase, to: Phase },
    /// 路由策略的决定
    Decision { decision: RouteDecision },
    /// 某来源贡献了上下文
    ContextFetched { source: ContextSource, snippets: usize },
    ProviderFailed { source: ContextSource, reason: String },
    GenerationFailed { attempt: u32, reason: String },
    /// 进入降级路径
    Fallback { reason: String },
    /// 得到最终回答
    Answer { source: ContextSource, attempts: u32 },
}
