use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub engines: Vec<EngineConfig>,
    pub cache: CacheConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

/// One reasoning engine endpoint. Order in `AppConfig::engines` is failover
/// order: the first entry is the primary, the rest are fallbacks.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub engine_attempts: u32,
    pub backoff_base_ms: u64,
    pub attachments_dir: PathBuf,
    pub transcripts_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub cache_path: Option<PathBuf>,
    pub attachments_dir: Option<PathBuf>,
    pub transcripts_dir: Option<PathBuf>,
    pub max_iterations: Option<u32>,
    pub log_level: Option<String>,
    pub engine_base_url: Option<String>,
    pub engine_model: Option<String>,
    pub engine_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engines: vec![EngineConfig {
                name: "primary".to_string(),
                base_url: "http://localhost:11434/v1".to_string(),
                model: "llama3.1".to_string(),
                api_key: None,
                timeout_secs: 60,
            }],
            cache: CacheConfig { path: PathBuf::from("answers.json") },
            agent: AgentConfig {
                max_iterations: 50,
                engine_attempts: 5,
                backoff_base_ms: 500,
                attachments_dir: PathBuf::from("attachments"),
                transcripts_dir: None,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("solvent.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(engines) = patch.engines {
            if !engines.is_empty() {
                self.engines = engines
                    .into_iter()
                    .enumerate()
                    .map(|(index, engine)| EngineConfig {
                        name: engine.name.unwrap_or_else(|| format!("engine-{index}")),
                        base_url: engine
                            .base_url
                            .unwrap_or_else(|| "http://localhost:11434/v1".to_string()),
                        model: engine.model.unwrap_or_else(|| "llama3.1".to_string()),
                        api_key: engine.api_key.map(secret_value),
                        timeout_secs: engine.timeout_secs.unwrap_or(60),
                    })
                    .collect();
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(path) = cache.path {
                self.cache.path = path;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_iterations) = agent.max_iterations {
                self.agent.max_iterations = max_iterations;
            }
            if let Some(engine_attempts) = agent.engine_attempts {
                self.agent.engine_attempts = engine_attempts;
            }
            if let Some(backoff_base_ms) = agent.backoff_base_ms {
                self.agent.backoff_base_ms = backoff_base_ms;
            }
            if let Some(attachments_dir) = agent.attachments_dir {
                self.agent.attachments_dir = attachments_dir;
            }
            if let Some(transcripts_dir) = agent.transcripts_dir {
                self.agent.transcripts_dir = Some(transcripts_dir);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SOLVENT_CACHE_PATH") {
            self.cache.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("SOLVENT_ATTACHMENTS_DIR") {
            self.agent.attachments_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("SOLVENT_TRANSCRIPTS_DIR") {
            self.agent.transcripts_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("SOLVENT_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_u32("SOLVENT_MAX_ITERATIONS", &value)?;
        }
        if let Some(value) = read_env("SOLVENT_ENGINE_ATTEMPTS") {
            self.agent.engine_attempts = parse_u32("SOLVENT_ENGINE_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("SOLVENT_BACKOFF_BASE_MS") {
            self.agent.backoff_base_ms = parse_u64("SOLVENT_BACKOFF_BASE_MS", &value)?;
        }

        // Engine env overrides always target the primary (first) engine.
        if let Some(value) = read_env("SOLVENT_ENGINE_BASE_URL") {
            if let Some(engine) = self.engines.first_mut() {
                engine.base_url = value;
            }
        }
        if let Some(value) = read_env("SOLVENT_ENGINE_MODEL") {
            if let Some(engine) = self.engines.first_mut() {
                engine.model = value;
            }
        }
        if let Some(value) = read_env("SOLVENT_ENGINE_API_KEY") {
            if let Some(engine) = self.engines.first_mut() {
                engine.api_key = Some(secret_value(value));
            }
        }
        if let Some(value) = read_env("SOLVENT_ENGINE_TIMEOUT_SECS") {
            let timeout_secs = parse_u64("SOLVENT_ENGINE_TIMEOUT_SECS", &value)?;
            if let Some(engine) = self.engines.first_mut() {
                engine.timeout_secs = timeout_secs;
            }
        }

        let log_level = read_env("SOLVENT_LOGGING_LEVEL").or_else(|| read_env("SOLVENT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SOLVENT_LOGGING_FORMAT").or_else(|| read_env("SOLVENT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(cache_path) = overrides.cache_path {
            self.cache.path = cache_path;
        }
        if let Some(attachments_dir) = overrides.attachments_dir {
            self.agent.attachments_dir = attachments_dir;
        }
        if let Some(transcripts_dir) = overrides.transcripts_dir {
            self.agent.transcripts_dir = Some(transcripts_dir);
        }
        if let Some(max_iterations) = overrides.max_iterations {
            self.agent.max_iterations = max_iterations;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(base_url) = overrides.engine_base_url {
            if let Some(engine) = self.engines.first_mut() {
                engine.base_url = base_url;
            }
        }
        if let Some(model) = overrides.engine_model {
            if let Some(engine) = self.engines.first_mut() {
                engine.model = model;
            }
        }
        if let Some(api_key) = overrides.engine_api_key {
            if let Some(engine) = self.engines.first_mut() {
                engine.api_key = Some(secret_value(api_key));
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_engines(&self.engines)?;
        validate_cache(&self.cache)?;
        validate_agent(&self.agent)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("solvent.toml"), PathBuf::from("config/solvent.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_engines(engines: &[EngineConfig]) -> Result<(), ConfigError> {
    if engines.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[engines]] entry is required".to_string(),
        ));
    }

    for engine in engines {
        if engine.name.trim().is_empty() {
            return Err(ConfigError::Validation("engines.name must not be empty".to_string()));
        }
        if !engine.base_url.starts_with("http://") && !engine.base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "engines.base_url for `{}` must start with http:// or https://",
                engine.name
            )));
        }
        if engine.model.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "engines.model for `{}` must not be empty",
                engine.name
            )));
        }
        if engine.timeout_secs == 0 || engine.timeout_secs > 300 {
            return Err(ConfigError::Validation(format!(
                "engines.timeout_secs for `{}` must be in range 1..=300",
                engine.name
            )));
        }
        if let Some(api_key) = &engine.api_key {
            if api_key.expose_secret().trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "engines.api_key for `{}` is set but empty",
                    engine.name
                )));
            }
        }
    }

    let mut names: Vec<&str> = engines.iter().map(|engine| engine.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    if names.len() != engines.len() {
        return Err(ConfigError::Validation("engine names must be unique".to_string()));
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("cache.path must not be empty".to_string()));
    }
    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_iterations == 0 || agent.max_iterations > 500 {
        return Err(ConfigError::Validation(
            "agent.max_iterations must be in range 1..=500".to_string(),
        ));
    }
    if agent.engine_attempts == 0 || agent.engine_attempts > 10 {
        return Err(ConfigError::Validation(
            "agent.engine_attempts must be in range 1..=10".to_string(),
        ));
    }
    if agent.backoff_base_ms == 0 || agent.backoff_base_ms > 60_000 {
        return Err(ConfigError::Validation(
            "agent.backoff_base_ms must be in range 1..=60000".to_string(),
        ));
    }
    if agent.attachments_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "agent.attachments_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    engines: Option<Vec<EnginePatch>>,
    cache: Option<CachePatch>,
    agent: Option<AgentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    name: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_iterations: Option<u32>,
    engine_attempts: Option<u32>,
    backoff_base_ms: Option<u64>,
    attachments_dir: Option<PathBuf>,
    transcripts_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
