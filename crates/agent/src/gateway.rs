use std::time::Duration;

use tracing::{debug, warn};

use solvent_core::Conversation;

use crate::llm::{Decision, ReasoningEngine, ToolDefinition};

/// Result of asking the gateway for one decision.
///
/// Exhaustion is a value, not an error: the caller degrades to a
/// best-effort answer instead of failing the run.
pub enum GatewayOutcome {
    Decision { decision: Decision, engine: String },
    Exhausted,
}

/// Ordered engines with per-engine retry budgets.
///
/// Transient failures consume attempts on the current engine with
/// exponentially growing backoff; fatal failures skip the remaining
/// budget and fail over immediately.
pub struct EngineGateway {
    engines: Vec<Box<dyn ReasoningEngine>>,
    attempts: u32,
    backoff_base: Duration,
}

impl EngineGateway {
    pub fn new(engines: Vec<Box<dyn ReasoningEngine>>) -> Self {
        Self { engines, attempts: 5, backoff_base: Duration::from_millis(500) }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    pub async fn decide(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> GatewayOutcome {
        for engine in &self.engines {
            let name = engine.describe();
            let mut delay = self.backoff_base;

            for attempt in 1..=self.attempts {
                match engine.decide(conversation, tools).await {
                    Ok(decision) => {
                        debug!(engine = %name, attempt, "engine produced a decision");
                        return GatewayOutcome::Decision { decision, engine: name };
                    }
                    Err(error) if error.is_transient() => {
                        warn!(engine = %name, attempt, %error, "transient engine failure");
                        if attempt < self.attempts {
                            tokio::time::sleep(delay).await;
                            delay *= 2;
                        }
                    }
                    Err(error) => {
                        warn!(engine = %name, attempt, %error, "fatal engine failure, failing over");
                        break;
                    }
                }
            }
        }

        warn!("all engines exhausted");
        GatewayOutcome::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use solvent_core::{Conversation, EngineError};

    use super::{Decision, EngineGateway, GatewayOutcome, ReasoningEngine, ToolDefinition};

    /// Engine that replays a fixed script of results and counts calls.
    struct ScriptedEngine {
        name: &'static str,
        script: Mutex<Vec<Result<Decision, EngineError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedEngine {
        fn new(name: &'static str, script: Vec<Result<Decision, EngineError>>) -> Self {
            let mut script = script;
            script.reverse();
            Self { name, script: Mutex::new(script), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ReasoningEngine for ScriptedEngine {
        fn describe(&self) -> String {
            self.name.to_string()
        }

        async fn decide(
            &self,
            _conversation: &Conversation,
            _tools: &[ToolDefinition],
        ) -> Result<Decision, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .expect("script lock")
                .pop()
                .unwrap_or_else(|| Err(EngineError::Transient("script exhausted".to_string())))
        }
    }

    fn gateway(engines: Vec<Box<dyn ReasoningEngine>>) -> EngineGateway {
        EngineGateway::new(engines)
            .with_attempts(3)
            .with_backoff_base(Duration::from_millis(1))
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_then_succeed() {
        let engine = ScriptedEngine::new(
            "primary",
            vec![
                Err(EngineError::Transient("429".to_string())),
                Err(EngineError::Transient("timeout".to_string())),
                Ok(Decision::FinalAnswer("4".to_string())),
            ],
        );

        let outcome = gateway(vec![Box::new(engine)]).decide(&Conversation::new(), &[]).await;
        let GatewayOutcome::Decision { decision, engine } = outcome else {
            panic!("expected a decision");
        };
        assert_eq!(decision, Decision::FinalAnswer("4".to_string()));
        assert_eq!(engine, "primary");
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failure_skips_remaining_attempts_and_fails_over() {
        let primary = ScriptedEngine::new(
            "primary",
            vec![Err(EngineError::Fatal("bad request".to_string()))],
        );
        let fallback = ScriptedEngine::new(
            "fallback",
            vec![Ok(Decision::FinalAnswer("Paris".to_string()))],
        );

        let outcome = gateway(vec![Box::new(primary), Box::new(fallback)])
            .decide(&Conversation::new(), &[])
            .await;
        let GatewayOutcome::Decision { decision, engine } = outcome else {
            panic!("expected a decision");
        };
        assert_eq!(decision, Decision::FinalAnswer("Paris".to_string()));
        assert_eq!(engine, "fallback");
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_is_a_value_after_the_full_budget() {
        let primary = ScriptedEngine::new("primary", vec![]);
        let fallback = ScriptedEngine::new("fallback", vec![]);

        let outcome = gateway(vec![Box::new(primary), Box::new(fallback)])
            .decide(&Conversation::new(), &[])
            .await;
        assert!(matches!(outcome, GatewayOutcome::Exhausted));
    }

    #[tokio::test(start_paused = true)]
    async fn each_engine_gets_its_own_attempt_budget() {
        let primary = ScriptedEngine::new("primary", vec![]);
        let fallback = ScriptedEngine::new(
            "fallback",
            vec![
                Err(EngineError::Transient("503".to_string())),
                Ok(Decision::FinalAnswer("42".to_string())),
            ],
        );
        let primary_calls = std::sync::Arc::new(primary);
        let fallback_calls = std::sync::Arc::new(fallback);

        let outcome = gateway(vec![
            Box::new(SharedEngine(primary_calls.clone())),
            Box::new(SharedEngine(fallback_calls.clone())),
        ])
        .decide(&Conversation::new(), &[])
        .await;

        assert!(matches!(outcome, GatewayOutcome::Decision { .. }));
        assert_eq!(primary_calls.calls.load(Ordering::SeqCst), 3);
        assert_eq!(fallback_calls.calls.load(Ordering::SeqCst), 2);
    }

    struct SharedEngine(std::sync::Arc<ScriptedEngine>);

    #[async_trait]
    impl ReasoningEngine for SharedEngine {
        fn describe(&self) -> String {
            self.0.describe()
        }

        async fn decide(
            &self,
            conversation: &Conversation,
            tools: &[ToolDefinition],
        ) -> Result<Decision, EngineError> {
            self.0.decide(conversation, tools).await
        }
    }
}
