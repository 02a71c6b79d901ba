//! 编排器：单轮问答状态机
//!
//! Start -> Retrieving* -> Generating -> Done；任何位置遇到 Fail、步数超限或意外 panic
//! 都进入 FallbackDone：空上下文直接生成，保证用户总能得到回答；降级也失败时返回
//! OrchestratorError::FallbackFailure。编排器不持有可变共享状态，可被多个会话并发调用。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::core::{
    ContextSource, DefaultRoutingPolicy, FallbackReason, GenerationStep, Generator,
    OrchestratorError, Phase, RecoveryAction, RecoveryEngine, RouteDecision, RoutingPolicy,
    RunEvent, RunState,
};
use crate::providers::{ContextProvider, ProviderKind};

const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// 一次编排的结果
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub answer: String,
    /// 回答所依据的上下文；降级回答为空
    pub context: String,
    pub context_source: ContextSource,
    pub generation_attempts: u32,
    pub steps: u32,
    /// Done 或 FallbackDone
    pub terminal: Phase,
    pub fallback_reason: Option<String>,
}

impl RunResult {
    pub fn is_fallback(&self) -> bool {
        self.terminal == Phase::FallbackDone
    }
}

pub struct Orchestrator {
    provider: ContextProvider,
    generation: GenerationStep,
    policy: Arc<dyn RoutingPolicy>,
    recovery: RecoveryEngine,
    config: OrchestratorConfig,
}

fn send_event(tx: Option<&UnboundedSender<RunEvent>>, ev: RunEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

impl Orchestrator {
    /// 未接入的来源在配置中视为关闭
    pub fn new(
        provider: ContextProvider,
        generator: Arc<dyn Generator>,
        mut config: OrchestratorConfig,
    ) -> Self {
        config.vector_store_enabled &= provider.has(ProviderKind::VectorStore);
        config.web_search_enabled &= provider.has(ProviderKind::WebSearch);
        Self {
            provider,
            generation: GenerationStep::new(generator, DEFAULT_GENERATION_TIMEOUT),
            policy: Arc::new(DefaultRoutingPolicy),
            recovery: RecoveryEngine::new(),
            config,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn RoutingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation = self.generation.with_timeout(timeout);
        self
    }

    /// 生效配置（已按实际接入的来源修正开关）
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn run(&self, question: &str) -> Result<RunResult, OrchestratorError> {
        self.run_with_events(question, None).await
    }

    /// 执行一轮编排；event_tx 可选，用于推送过程事件
    pub async fn run_with_events(
        &self,
        question: &str,
        event_tx: Option<&UnboundedSender<RunEvent>>,
    ) -> Result<RunResult, OrchestratorError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        async move {
            let mut state = RunState::new(question);
            tracing::info!(question_chars = question.chars().count(), "run started");

            let outcome = AssertUnwindSafe(self.drive(&mut state, event_tx))
                .catch_unwind()
                .await;
            let reason = match outcome {
                Ok(Ok(())) => return Ok(self.finish(&state, event_tx)),
                Ok(Err(reason)) => reason,
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    tracing::error!(panic = %msg, "run loop panicked");
                    FallbackReason::Panic(msg)
                }
            };
            self.fallback(&mut state, reason, event_tx).await
        }
        .instrument(span)
        .await
    }

    /// 主循环：Ok 表示已生成回答（Done），Err 为降级原因
    async fn drive(
        &self,
        state: &mut RunState,
        event_tx: Option<&UnboundedSender<RunEvent>>,
    ) -> Result<(), FallbackReason> {
        loop {
            if state.steps() >= self.config.step_ceiling {
                tracing::warn!(steps = state.steps(), "step ceiling reached");
                return Err(FallbackReason::StepCeiling {
                    steps: state.steps(),
                });
            }
            let step = state.record_step();
            send_event(event_tx, RunEvent::StepUpdate {
                step,
                step_ceiling: self.config.step_ceiling,
            });

            let decision = self.policy.decide(state, &self.config);
            tracing::debug!(step, ?decision, attempts = state.generation_attempts(), "route");
            send_event(event_tx, RunEvent::Decision { decision });

            let action = match decision {
                RouteDecision::UseVectorStore => {
                    self.retrieve(state, ProviderKind::VectorStore, event_tx).await
                }
                RouteDecision::UseWebSearch => {
                    self.retrieve(state, ProviderKind::WebSearch, event_tx).await
                }
                RouteDecision::Generate => {
                    self.transition(state, Phase::Generating, event_tx);
                    let result = self
                        .generation
                        .run(state, self.config.generation_attempt_ceiling)
                        .await;
                    match result {
                        Ok(()) => {
                            self.transition(state, Phase::Done, event_tx);
                            return Ok(());
                        }
                        Err(e) => {
                            tracing::warn!(
                                attempt = state.generation_attempts(),
                                error = %e,
                                "generation failed"
                            );
                            send_event(event_tx, RunEvent::GenerationFailed {
                                attempt: state.generation_attempts(),
                                reason: e.to_string(),
                            });
                            self.recovery.on_generation_error(&e)
                        }
                    }
                }
                RouteDecision::Fail => {
                    return Err(FallbackReason::ExhaustedAttempts {
                        attempts: state.generation_attempts(),
                    })
                }
            };

            if let RecoveryAction::Fallback(reason) = action {
                return Err(reason);
            }
        }
    }

    /// 取一次上下文；成功时返回 Reroute（继续询问路由）
    async fn retrieve(
        &self,
        state: &mut RunState,
        kind: ProviderKind,
        event_tx: Option<&UnboundedSender<RunEvent>>,
    ) -> RecoveryAction {
        self.transition(state, Phase::Retrieving, event_tx);
        state.mark_tried(kind);
        let result = self.provider.fetch(kind, state.question()).await;
        match result {
            Ok(fetched) => {
                if fetched.snippets.is_empty() {
                    tracing::info!(source = %fetched.source, "no context returned");
                } else {
                    send_event(event_tx, RunEvent::ContextFetched {
                        source: fetched.source,
                        snippets: fetched.snippets.len(),
                    });
                    state.extend_documents(fetched.source, fetched.snippets);
                }
                RecoveryAction::Reroute
            }
            Err(e) => {
                tracing::warn!(error = %e, "context provider failed");
                send_event(event_tx, RunEvent::ProviderFailed {
                    source: kind.source(),
                    reason: e.to_string(),
                });
                self.recovery.on_provider_error(&e)
            }
        }
    }

    fn transition(
        &self,
        state: &mut RunState,
        to: Phase,
        event_tx: Option<&UnboundedSender<RunEvent>>,
    ) {
        if let Some(from) = state.enter(to) {
            if from != to {
                tracing::debug!(?from, ?to, "phase");
                send_event(event_tx, RunEvent::PhaseChanged { from, to });
            }
        }
    }

    fn finish(&self, state: &RunState, event_tx: Option<&UnboundedSender<RunEvent>>) -> RunResult {
        let answer = state.generation().unwrap_or_default().to_string();
        tracing::info!(
            source = %state.context_source(),
            attempts = state.generation_attempts(),
            steps = state.steps(),
            "run done"
        );
        send_event(event_tx, RunEvent::Answer {
            source: state.context_source(),
            attempts: state.generation_attempts(),
        });
        RunResult {
            answer,
            context: state.context().to_string(),
            context_source: state.context_source(),
            generation_attempts: state.generation_attempts(),
            steps: state.steps(),
            terminal: Phase::Done,
            fallback_reason: None,
        }
    }

    /// 降级：绕过检索，空上下文直接生成
    async fn fallback(
        &self,
        state: &mut RunState,
        reason: FallbackReason,
        event_tx: Option<&UnboundedSender<RunEvent>>,
    ) -> Result<RunResult, OrchestratorError> {
        tracing::warn!(%reason, "falling back to direct generation");
        self.transition(state, Phase::FallbackDone, event_tx);
        send_event(event_tx, RunEvent::Fallback {
            reason: reason.to_string(),
        });

        let result = self.generation.direct(state.question()).await;
        match result {
            Ok(answer) => {
                send_event(event_tx, RunEvent::Answer {
                    source: ContextSource::None,
                    attempts: state.generation_attempts(),
                });
                Ok(RunResult {
                    answer,
                    context: String::new(),
                    context_source: ContextSource::None,
                    generation_attempts: state.generation_attempts(),
                    steps: state.steps(),
                    terminal: Phase::FallbackDone,
                    fallback_reason: Some(reason.to_string()),
                })
            }
            Err(source) => {
                tracing::error!(%reason, error = %source, "fallback generation failed");
                Err(OrchestratorError::FallbackFailure { reason, source })
            }
        }
    }
}
