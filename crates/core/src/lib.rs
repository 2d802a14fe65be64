pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, EngineConfig, LoadOptions, LogFormat};
pub use domain::conversation::{
    Conversation, Message, Role, ToolCall, ToolResult, ToolStatus,
};
pub use domain::outcome::LoopOutcome;
pub use domain::question::{Question, QuestionId};
pub use errors::{CacheError, EngineError, NormalizeError};
