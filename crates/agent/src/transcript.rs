use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use solvent_core::{LoopOutcome, Message, Question};

use crate::runtime::RunResult;

/// Persists one finished run as a JSON file for later inspection.
///
/// Transcripts are an audit artifact: a write failure is logged and
/// swallowed so it can never cost the caller an answer.
pub struct TranscriptWriter {
    dir: PathBuf,
}

#[derive(Serialize)]
struct Transcript<'a> {
    question_id: &'a str,
    question: &'a str,
    recorded_at: DateTime<Utc>,
    iterations: u32,
    deciding_engine: Option<&'a str>,
    outcome: &'a LoopOutcome,
    messages: &'a [Message],
}

impl TranscriptWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn record(&self, question: &Question, run: &RunResult) {
        let recorded_at = Utc::now();
        let transcript = Transcript {
            question_id: &question.id.0,
            question: &question.text,
            recorded_at,
            iterations: run.iterations,
            deciding_engine: run.deciding_engine.as_deref(),
            outcome: &run.outcome,
            messages: run.conversation.messages(),
        };

        let file_name = format!(
            "{}-{}.json",
            sanitize(&question.id.0),
            recorded_at.format("%Y%m%dT%H%M%S%3f")
        );
        let path = self.dir.join(file_name);

        let result = fs::create_dir_all(&self.dir)
            .map_err(|error| error.to_string())
            .and_then(|_| {
                serde_json::to_string_pretty(&transcript).map_err(|error| error.to_string())
            })
            .and_then(|payload| {
                fs::write(&path, payload).map_err(|error| error.to_string())
            });

        match result {
            Ok(()) => debug!(path = %path.display(), "transcript written"),
            Err(error) => {
                warn!(path = %path.display(), %error, "could not write transcript");
            }
        }
    }
}

fn sanitize(id: &str) -> String {
    id.chars().map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' }).collect()
}
