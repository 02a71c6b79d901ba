//! 路由策略：根据 RunState 与静态配置决定下一步
//!
//! 默认策略是确定性的：先知识库、再联网搜索、有上下文或来源都试过后生成；
//! 生成次数到达上限时返回 Fail，由编排器走降级路径。
//! 「信息是否足够」的判断不在这里，由生成模型在回答中自行体现（追问或给建议）。

use serde::Serialize;

use crate::config::OrchestratorConfig;
use crate::core::RunState;

/// 路由决策
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    UseVectorStore,
    UseWebSearch,
    Generate,
    Fail,
}

/// 路由策略 trait：纯函数，不得修改状态
pub trait RoutingPolicy: Send + Sync {
    fn decide(&self, state: &RunState, config: &OrchestratorConfig) -> RouteDecision;
}

/// 默认策略（知识库优先）
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRoutingPolicy;

impl RoutingPolicy for DefaultRoutingPolicy {
    fn decide(&self, state: &RunState, config: &OrchestratorConfig) -> RouteDecision {
        if state.generation_attempts() >= config.generation_attempt_ceiling {
            return RouteDecision::Fail;
        }
        if state.documents().is_empty() {
            let tried = state.tried();
            if config.vector_store_enabled && !tried.vector_store {
                return RouteDecision::UseVectorStore;
            }
            if config.web_search_enabled && !tried.web_search {
                return RouteDecision::UseWebSearch;
            }
        }
        RouteDecision::Generate
    }
}
