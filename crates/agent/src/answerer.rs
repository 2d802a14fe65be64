use serde::Serialize;
use tracing::{info, warn};

use solvent_core::{NormalizeError, Question};

use crate::cache::AnswerCache;
use crate::normalize::normalize_for_question;
use crate::runtime::{CancelToken, ReasoningLoop, NO_ANSWER_MARKER};
use crate::transcript::TranscriptWriter;

/// Where an answer came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOrigin {
    /// Exact-match cache hit, zero engine calls.
    Cache,
    /// A run that finished with a proper final answer.
    Completed,
    /// A run cut short; the answer is best-effort.
    Aborted,
}

/// What the caller gets back for one question.
#[derive(Clone, Debug, Serialize)]
pub struct AnswerReport {
    pub answer: String,
    pub cache_hit: bool,
    pub origin: AnswerOrigin,
    pub iterations: u32,
}

/// Caller-facing service tying the pieces together: cache check, loop
/// run, normalization, cache write-back, transcript.
pub struct Answerer {
    cache: AnswerCache,
    reasoning: ReasoningLoop,
    transcripts: Option<TranscriptWriter>,
}

impl Answerer {
    pub fn new(cache: AnswerCache, reasoning: ReasoningLoop) -> Self {
        Self { cache, reasoning, transcripts: None }
    }

    pub fn with_transcripts(mut self, transcripts: TranscriptWriter) -> Self {
        self.transcripts = Some(transcripts);
        self
    }

    pub async fn answer(&mut self, question: &Question, cancel: &CancelToken) -> AnswerReport {
        // Cache keys are the question text trimmed, nothing more.
        let question_text = question.text.trim();
        if let Some(cached) = self.cache.get(question_text) {
            info!(question_id = %question.id.0, "answer served from cache");
            return AnswerReport {
                answer: cached.to_string(),
                cache_hit: true,
                origin: AnswerOrigin::Cache,
                iterations: 0,
            };
        }

        let run = self.reasoning.run(question, cancel).await;

        let raw = run.outcome.text();
        let (answer, normalized) = match normalize_for_question(raw, question_text) {
            Ok(normalized) => (normalized, true),
            // An answer emptied by normalization is still an answer; fall
            // back to the raw text rather than inventing content. A raw
            // text that is itself blank degrades to the marker so the
            // caller always receives something non-empty.
            Err(NormalizeError::EmptyAnswer) => {
                let fallback = if raw.trim().is_empty() {
                    NO_ANSWER_MARKER.to_string()
                } else {
                    raw.to_string()
                };
                (fallback, false)
            }
        };

        let origin = if run.outcome.is_final() {
            // Only proper final answers that survived normalization's
            // non-empty check are worth remembering.
            if normalized {
                if let Err(error) = self.cache.put(question_text, &answer) {
                    warn!(question_id = %question.id.0, %error, "could not persist answer to cache");
                }
            }
            AnswerOrigin::Completed
        } else {
            AnswerOrigin::Aborted
        };

        if let Some(transcripts) = &self.transcripts {
            transcripts.record(question, &run);
        }

        AnswerReport { answer, cache_hit: false, origin, iterations: run.iterations }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use solvent_core::{Conversation, EngineError, Question};

    use crate::cache::AnswerCache;
    use crate::capabilities::builtin_registry;
    use crate::gateway::EngineGateway;
    use crate::llm::{Decision, ReasoningEngine, ToolDefinition};
    use crate::runtime::{CancelToken, ReasoningLoop};
    use crate::tools::{CapabilityContext, CapabilityDispatcher};
    use crate::transcript::TranscriptWriter;

    use super::{AnswerOrigin, Answerer};

    struct CountingEngine {
        script: Mutex<Vec<Result<Decision, EngineError>>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReasoningEngine for CountingEngine {
        fn describe(&self) -> String {
            "counting".to_string()
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
                .unwrap_or_else(|| Err(EngineError::Fatal("script exhausted".to_string())))
        }
    }

    fn answerer(
        dir: &TempDir,
        script: Vec<Result<Decision, EngineError>>,
    ) -> (Answerer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut script = script;
        script.reverse();
        let engine = CountingEngine { script: Mutex::new(script), calls: Arc::clone(&calls) };

        let gateway = EngineGateway::new(vec![Box::new(engine)])
            .with_attempts(1)
            .with_backoff_base(Duration::from_millis(1));
        let dispatcher = CapabilityDispatcher::new(
            builtin_registry(),
            CapabilityContext::new(dir.path(), dir.path().join("attachments")),
        );
        let reasoning = ReasoningLoop::new(gateway, dispatcher);
        let cache = AnswerCache::load(dir.path().join("answers.json"));

        (Answerer::new(cache, reasoning), calls)
    }

    #[tokio::test]
    async fn second_ask_is_served_from_cache_with_zero_engine_calls() {
        let dir = TempDir::new().expect("create temp dir");
        let question = Question::new("q-1", "What is 2+2?");

        let (mut first, first_calls) =
            answerer(&dir, vec![Ok(Decision::FinalAnswer("4".to_string()))]);
        let report = first.answer(&question, &CancelToken::new()).await;
        assert_eq!(report.answer, "4");
        assert!(!report.cache_hit);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);

        // Fresh answerer over the same cache file.
        let (mut second, second_calls) = answerer(&dir, vec![]);
        let report = second.answer(&question, &CancelToken::new()).await;
        assert_eq!(report.answer, "4");
        assert!(report.cache_hit);
        assert_eq!(report.origin, AnswerOrigin::Cache);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn answers_are_normalized_before_caching() {
        let dir = TempDir::new().expect("create temp dir");
        let raw = "```json\n{\"answer\": \"Paris\"}\n```";
        let (mut answerer, _calls) =
            answerer(&dir, vec![Ok(Decision::FinalAnswer(raw.to_string()))]);

        let question = Question::new("q-2", "What is the capital of France?");
        let report = answerer.answer(&question, &CancelToken::new()).await;
        assert_eq!(report.answer, "Paris");
        assert_eq!(report.origin, AnswerOrigin::Completed);

        let cache = AnswerCache::load(dir.path().join("answers.json"));
        assert_eq!(cache.get("What is the capital of France?"), Some("Paris"));
    }

    #[tokio::test]
    async fn blank_final_answer_degrades_to_the_marker() {
        let dir = TempDir::new().expect("create temp dir");
        let (mut answerer, _calls) =
            answerer(&dir, vec![Ok(Decision::FinalAnswer(String::new()))]);

        let question = Question::new("q-5", "Say nothing.");
        let report = answerer.answer(&question, &CancelToken::new()).await;
        assert!(!report.answer.is_empty());
        assert_eq!(report.answer, crate::runtime::NO_ANSWER_MARKER);

        let cache = AnswerCache::load(dir.path().join("answers.json"));
        assert_eq!(cache.get("Say nothing."), None);
    }

    #[tokio::test]
    async fn answers_that_fail_the_non_empty_check_are_not_cached() {
        let dir = TempDir::new().expect("create temp dir");
        let raw = "```\n\n```";
        let (mut answerer, _calls) =
            answerer(&dir, vec![Ok(Decision::FinalAnswer(raw.to_string()))]);

        let question = Question::new("q-6", "Empty fence?");
        let report = answerer.answer(&question, &CancelToken::new()).await;
        // The raw text stands in for the emptied answer,
        assert_eq!(report.answer, raw);
        // but it never reaches the cache.
        let cache = AnswerCache::load(dir.path().join("answers.json"));
        assert_eq!(cache.get("Empty fence?"), None);
    }

    #[tokio::test]
    async fn question_text_is_trimmed_for_cache_lookups_and_writes() {
        let dir = TempDir::new().expect("create temp dir");
        let (mut first, _calls) =
            answerer(&dir, vec![Ok(Decision::FinalAnswer("4".to_string()))]);
        first
            .answer(&Question::new("q-7", "  What is 2+2? "), &CancelToken::new())
            .await;

        let cache = AnswerCache::load(dir.path().join("answers.json"));
        assert_eq!(cache.get("What is 2+2?"), Some("4"));

        let (mut second, second_calls) = answerer(&dir, vec![]);
        let report = second
            .answer(&Question::new("q-8", "What is 2+2?  "), &CancelToken::new())
            .await;
        assert!(report.cache_hit);
        assert_eq!(report.answer, "4");
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn aborted_runs_are_reported_but_never_cached() {
        let dir = TempDir::new().expect("create temp dir");
        let (mut answerer, _calls) =
            answerer(&dir, vec![Err(EngineError::Fatal("down".to_string()))]);

        let question = Question::new("q-3", "Unanswerable?");
        let report = answerer.answer(&question, &CancelToken::new()).await;
        assert_eq!(report.origin, AnswerOrigin::Aborted);
        assert!(!report.answer.is_empty());

        let cache = AnswerCache::load(dir.path().join("answers.json"));
        assert_eq!(cache.get("Unanswerable?"), None);
    }

    #[tokio::test]
    async fn transcripts_are_written_for_engine_runs() {
        let dir = TempDir::new().expect("create temp dir");
        let transcripts_dir = dir.path().join("transcripts");
        let (answerer, _calls) =
            answerer(&dir, vec![Ok(Decision::FinalAnswer("4".to_string()))]);
        let mut answerer = answerer.with_transcripts(TranscriptWriter::new(&transcripts_dir));

        answerer.answer(&Question::new("q-4", "What is 2+2?"), &CancelToken::new()).await;

        let count = std::fs::read_dir(&transcripts_dir).expect("read transcripts dir").count();
        assert_eq!(count, 1);
    }
}
