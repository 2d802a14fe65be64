use serde::{Deserialize, Serialize};

/// Terminal value of one reasoning-loop run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "text")]
pub enum LoopOutcome {
    /// The engine produced a proper final answer.
    FinalAnswer(String),
    /// The run was cut short (engine exhaustion, iteration ceiling, or
    /// cancellation); carries the best-effort answer text.
    Aborted(String),
}

impl LoopOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::FinalAnswer(text) | Self::Aborted(text) => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer(_))
    }
}
