use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use serde::Serialize;

use solvent_core::config::{AppConfig, LoadOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_cache_readability(&config));
            checks.push(check_attachments_dir(&config));
            checks.push(check_engine_reachability(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["cache_readability", "attachments_dir", "engine_reachability"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_cache_readability(config: &AppConfig) -> DoctorCheck {
    match fs::read_to_string(&config.cache.path) {
        Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
            Ok(entries) => DoctorCheck {
                name: "cache_readability",
                status: CheckStatus::Pass,
                details: format!("cache holds {} entries", entries.len()),
            },
            Err(error) => DoctorCheck {
                name: "cache_readability",
                status: CheckStatus::Fail,
                details: format!(
                    "cache file is corrupt (it will be reset on next write): {error}"
                ),
            },
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => DoctorCheck {
            name: "cache_readability",
            status: CheckStatus::Pass,
            details: "cache file absent, will be created on first answer".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "cache_readability",
            status: CheckStatus::Fail,
            details: format!("cache file is unreadable: {error}"),
        },
    }
}

fn check_attachments_dir(config: &AppConfig) -> DoctorCheck {
    if config.agent.attachments_dir.is_dir() {
        DoctorCheck {
            name: "attachments_dir",
            status: CheckStatus::Pass,
            details: format!("`{}` exists", config.agent.attachments_dir.display()),
        }
    } else {
        DoctorCheck {
            name: "attachments_dir",
            status: CheckStatus::Pass,
            details: format!(
                "`{}` absent; file lookups will fall through to the working directory only",
                config.agent.attachments_dir.display()
            ),
        }
    }
}

fn check_engine_reachability(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "engine_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|error| format!("failed to build http client: {error}"))?;

        let mut details = Vec::new();
        for engine in &config.engines {
            // Any HTTP response counts as reachable; only transport
            // failures are a problem at this layer.
            let url = format!("{}/models", engine.base_url.trim_end_matches('/'));
            match client.get(&url).send().await {
                Ok(response) => {
                    details.push(format!("{}: reachable ({})", engine.name, response.status()))
                }
                Err(error) => {
                    return Err(format!("{}: unreachable ({error})", engine.name));
                }
            }
        }
        Ok::<String, String>(details.join("; "))
    });

    match result {
        Ok(details) => DoctorCheck { name: "engine_reachability", status: CheckStatus::Pass, details },
        Err(details) => {
            DoctorCheck { name: "engine_reachability", status: CheckStatus::Fail, details }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    for check in &report.checks {
        lines.push(format!("  [{:?}] {} - {}", check.status, check.name, check.details));
    }
    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
