//! 核心编排层：运行状态、路由策略、生成步骤、错误与恢复、过程事件、主控状态机

pub mod error;
pub mod events;
pub mod generation;
pub mod orchestrator;
pub mod recovery;
pub mod routing;
pub mod state;

pub use error::{FallbackReason, GenerationError, OrchestratorError, ProviderError};
pub use events::RunEvent;
pub use generation::{GenerationStep, Generator, LlmGenerator, DEFAULT_GENERATION_PROMPT};
pub use orchestrator::{Orchestrator, RunResult};
pub use recovery::{RecoveryAction, RecoveryEngine};
pub use routing::{DefaultRoutingPolicy, RouteDecision, RoutingPolicy};
pub use state::{ContextSource, Phase, RunState, SourcesTried, CONTEXT_SEPARATOR};
