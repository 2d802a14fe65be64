use std::fs;

use serde::Serialize;

use solvent_agent::runtime::CancelToken;
use solvent_agent::AnswerOrigin;
use solvent_core::config::{AppConfig, LoadOptions};
use solvent_core::Question;

use super::{build_answerer, CommandResult};

#[derive(Debug, Serialize)]
struct BatchEntry {
    id: String,
    answer: String,
    origin: AnswerOrigin,
    cache_hit: bool,
    iterations: u32,
}

/// Answers every question in a JSON file. Questions are isolated: an
/// aborted run yields a best-effort entry and the batch continues.
pub fn run(questions_path: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("run", "config_validation", error.to_string(), 2)
        }
    };

    let raw = match fs::read_to_string(questions_path) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "run",
                "questions_file",
                format!("could not read `{questions_path}`: {error}"),
                1,
            )
        }
    };
    let questions: Vec<Question> = match serde_json::from_str(&raw) {
        Ok(questions) => questions,
        Err(error) => {
            return CommandResult::failure(
                "run",
                "questions_file",
                format!("could not parse `{questions_path}`: {error}"),
                1,
            )
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "run",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                1,
            )
        }
    };

    let mut answerer = match build_answerer(&config) {
        Ok(answerer) => answerer,
        Err(error) => {
            return CommandResult::failure("run", "bootstrap", format!("{error:#}"), 1)
        }
    };

    let entries = runtime.block_on(async {
        let cancel = CancelToken::new();
        let handle = cancel.handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.cancel();
            }
        });

        let mut entries = Vec::with_capacity(questions.len());
        for question in &questions {
            // A cancelled batch drains quickly: each remaining run
            // observes the token before its first iteration.
            let report = answerer.answer(question, &cancel).await;
            entries.push(BatchEntry {
                id: question.id.0.clone(),
                answer: report.answer,
                origin: report.origin,
                cache_hit: report.cache_hit,
                iterations: report.iterations,
            });
        }
        entries
    });

    let message = format!("answered {} question(s)", entries.len());
    let data = serde_json::to_value(&entries).ok();
    CommandResult::success_with_data("run", message, data)
}
