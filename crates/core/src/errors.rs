use std::path::PathBuf;

use thiserror::Error;

/// Failure surfaced by a reasoning engine call.
///
/// The transient/fatal split drives the gateway's retry policy: transient
/// failures consume backoff retries on the current engine, fatal failures
/// advance straight to the next engine in the failover list.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("transient engine failure: {0}")]
    Transient(String),
    #[error("engine failure: {0}")]
    Fatal(String),
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("could not write cache file `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("could not serialize cache contents: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("answer is empty after normalization")]
    EmptyAnswer,
}

#[cfg(test)]
mod tests {
    use super::EngineError;

    #[test]
    fn transient_classification_is_exposed() {
        assert!(EngineError::Transient("429".to_string()).is_transient());
        assert!(!EngineError::Fatal("bad request".to_string()).is_transient());
    }
}
