use secrecy::ExposeSecret;

use solvent_core::config::{AppConfig, LoadOptions};

/// Renders the effective configuration. API keys are redacted down to a
/// short prefix; the full value never reaches stdout.
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let mut lines =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];

    for (index, engine) in config.engines.iter().enumerate() {
        let prefix = format!("engines[{index}]");
        lines.push(render_line(&format!("{prefix}.name"), &engine.name));
        lines.push(render_line(&format!("{prefix}.base_url"), &engine.base_url));
        lines.push(render_line(&format!("{prefix}.model"), &engine.model));
        let api_key = match &engine.api_key {
            Some(api_key) => redact_secret(api_key.expose_secret()),
            None => "(unset)".to_string(),
        };
        lines.push(render_line(&format!("{prefix}.api_key"), &api_key));
        lines.push(render_line(
            &format!("{prefix}.timeout_secs"),
            &engine.timeout_secs.to_string(),
        ));
    }

    lines.push(render_line("cache.path", &config.cache.path.display().to_string()));
    lines.push(render_line("agent.max_iterations", &config.agent.max_iterations.to_string()));
    lines.push(render_line("agent.engine_attempts", &config.agent.engine_attempts.to_string()));
    lines.push(render_line("agent.backoff_base_ms", &config.agent.backoff_base_ms.to_string()));
    lines.push(render_line(
        "agent.attachments_dir",
        &config.agent.attachments_dir.display().to_string(),
    ));
    lines.push(render_line(
        "agent.transcripts_dir",
        &config
            .agent
            .transcripts_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "(unset)".to_string()),
    ));
    lines.push(render_line("logging.level", &config.logging.level));
    lines.push(render_line("logging.format", &format!("{:?}", config.logging.format)));

    lines.join("\n")
}

fn render_line(key: &str, value: &str) -> String {
    format!("  {key} = {value}")
}

fn redact_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}****")
}
