pub mod ask;
pub mod config;
pub mod doctor;
pub mod run;

use serde::Serialize;
use serde_json::Value;

use solvent_agent::{
    AnswerCache, Answerer, CapabilityContext, CapabilityDispatcher, ChatHttpEngine, EngineGateway,
    ReasoningEngine, ReasoningLoop, TranscriptWriter,
};
use solvent_core::config::AppConfig;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Assembles the full answering stack from config: engines in failover
/// order, builtin capabilities, cache, and optional transcripts.
pub(crate) fn build_answerer(config: &AppConfig) -> anyhow::Result<Answerer> {
    let mut engines: Vec<Box<dyn ReasoningEngine>> = Vec::with_capacity(config.engines.len());
    for engine_config in &config.engines {
        engines.push(Box::new(ChatHttpEngine::from_config(engine_config)?));
    }

    let gateway = EngineGateway::new(engines)
        .with_attempts(config.agent.engine_attempts)
        .with_backoff_base(std::time::Duration::from_millis(config.agent.backoff_base_ms));

    let working_dir = std::env::current_dir()?;
    let dispatcher = CapabilityDispatcher::new(
        solvent_agent::capabilities::builtin_registry(),
        CapabilityContext::new(working_dir, &config.agent.attachments_dir),
    );

    let reasoning = ReasoningLoop::new(gateway, dispatcher)
        .with_max_iterations(config.agent.max_iterations);
    let cache = AnswerCache::load(&config.cache.path);

    let mut answerer = Answerer::new(cache, reasoning);
    if let Some(transcripts_dir) = &config.agent.transcripts_dir {
        answerer = answerer.with_transcripts(TranscriptWriter::new(transcripts_dir));
    }

    Ok(answerer)
}
