//! MedAssist - 医疗与心理健康问答编排
//!
//! 模块划分：
//! - **agent**: 按配置装配编排器、会话运行时（ChatSession）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 运行状态、路由策略、生成步骤、错误与恢复、编排状态机
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 对话历史与本地知识库
//! - **providers**: 上下文提供者（知识库检索 / 联网搜索）与结果归一化

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod providers;

pub use agent::{build_orchestrator, ChatSession, TurnReply};
pub use crate::core::{Orchestrator, RunResult};
