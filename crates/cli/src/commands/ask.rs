use solvent_agent::runtime::CancelToken;
use solvent_core::config::{AppConfig, LoadOptions};
use solvent_core::Question;
use uuid::Uuid;

use super::{build_answerer, CommandResult};

pub fn run(question_text: &str, attachment: Option<&str>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("ask", "config_validation", error.to_string(), 2)
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                1,
            )
        }
    };

    let mut answerer = match build_answerer(&config) {
        Ok(answerer) => answerer,
        Err(error) => {
            return CommandResult::failure("ask", "bootstrap", format!("{error:#}"), 1)
        }
    };

    let mut question = Question::new(Uuid::new_v4().to_string(), question_text);
    if let Some(attachment) = attachment {
        question = question.with_attachment(attachment);
    }

    let report = runtime.block_on(async {
        let cancel = CancelToken::new();
        let handle = cancel.handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.cancel();
            }
        });

        answerer.answer(&question, &cancel).await
    });

    let message = report.answer.clone();
    let data = serde_json::to_value(&report).ok();
    CommandResult::success_with_data("ask", message, data)
}
