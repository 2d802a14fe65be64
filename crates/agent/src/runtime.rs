use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use solvent_core::{Conversation, LoopOutcome, Message, Question};

use crate::gateway::{EngineGateway, GatewayOutcome};
use crate::llm::Decision;
use crate::tools::CapabilityDispatcher;

/// Placeholder answer for runs that abort before any assistant text.
pub const NO_ANSWER_MARKER: &str = "[no answer produced]";

const SYSTEM_PROMPT: &str = "You are a precise research assistant. Use the provided tools when \
they help, one step at a time. When you know the answer, reply with the final value only: no \
preamble, no 'final answer:' prefix, no code fences. For comma separated lists, separate items \
with a comma and a single space.";

/// Cooperative cancellation flag, checked only between loop iterations.
/// An in-flight engine call or tool batch always finishes first.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> CancelHandle {
        CancelHandle { flag: Arc::clone(&self.flag) }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Everything one run produced, including the full message log for
/// transcript persistence.
pub struct RunResult {
    pub outcome: LoopOutcome,
    pub conversation: Conversation,
    pub iterations: u32,
    pub deciding_engine: Option<String>,
}

/// The bounded think/act loop.
///
/// Each iteration asks the gateway for one decision; tool requests are
/// executed sequentially and appended as observations, final answers end
/// the run. The iteration ceiling, gateway exhaustion, and cancellation
/// all abort with the most recent non-empty assistant text.
pub struct ReasoningLoop {
    gateway: EngineGateway,
    dispatcher: CapabilityDispatcher,
    max_iterations: u32,
}

impl ReasoningLoop {
    pub fn new(gateway: EngineGateway, dispatcher: CapabilityDispatcher) -> Self {
        Self { gateway, dispatcher, max_iterations: 50 }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub async fn run(&self, question: &Question, cancel: &CancelToken) -> RunResult {
        let mut conversation = seed_conversation(question);
        let tools = self.dispatcher.definitions();
        let mut iterations = 0u32;
        let mut deciding_engine = None;

        info!(question_id = %question.id.0, "reasoning loop started");

        loop {
            if cancel.is_cancelled() {
                warn!(question_id = %question.id.0, iterations, "run cancelled");
                return abort(conversation, iterations, deciding_engine);
            }
            if iterations >= self.max_iterations {
                warn!(question_id = %question.id.0, iterations, "iteration ceiling reached");
                return abort(conversation, iterations, deciding_engine);
            }
            iterations += 1;

            match self.gateway.decide(&conversation, &tools).await {
                GatewayOutcome::Exhausted => {
                    warn!(question_id = %question.id.0, iterations, "engines exhausted");
                    return abort(conversation, iterations, deciding_engine);
                }
                GatewayOutcome::Decision { decision, engine } => {
                    deciding_engine = Some(engine);
                    match decision {
                        Decision::FinalAnswer(text) => {
                            conversation.push(Message::assistant(&text));
                            info!(question_id = %question.id.0, iterations, "final answer produced");
                            return RunResult {
                                outcome: LoopOutcome::FinalAnswer(text),
                                conversation,
                                iterations,
                                deciding_engine,
                            };
                        }
                        Decision::RequestTools { thought, calls } => {
                            debug!(
                                question_id = %question.id.0,
                                iterations,
                                calls = calls.len(),
                                "executing requested tools"
                            );
                            conversation.push(Message::assistant_with_calls(thought, calls.clone()));
                            let results = self.dispatcher.dispatch_all(&calls).await;
                            for result in &results {
                                conversation.push(Message::tool(result));
                            }
                        }
                    }
                }
            }
        }
    }
}

fn seed_conversation(question: &Question) -> Conversation {
    let mut conversation = Conversation::new();
    conversation.push(Message::system(SYSTEM_PROMPT));

    let mut text = question.text.clone();
    if let Some(attachment) = &question.attachment {
        text.push_str(&format!(
            "\n\nAn attached file named `{attachment}` is available to your tools."
        ));
    }
    conversation.push(Message::user(text));
    conversation
}

fn abort(
    conversation: Conversation,
    iterations: u32,
    deciding_engine: Option<String>,
) -> RunResult {
    let best_effort = conversation
        .last_assistant_text()
        .map(str::to_string)
        .unwrap_or_else(|| NO_ANSWER_MARKER.to_string());

    RunResult {
        outcome: LoopOutcome::Aborted(best_effort),
        conversation,
        iterations,
        deciding_engine,
    }
}
