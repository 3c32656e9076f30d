use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_JSON_LOG_NAME: &str = "interview.logs.jsonl";

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservabilitySettings {
    pub enabled: bool,
    /// Filter directive from `INTERVIEW_LOG_LEVEL`; `RUST_LOG` applies when unset.
    pub level: Option<String>,
    /// JSONL destination; console output when unset.
    pub json_log_path: Option<PathBuf>,
}

impl ObservabilitySettings {
    /// Reads `INTERVIEW_OBSERVABILITY`, `INTERVIEW_LOG_LEVEL` and
    /// `INTERVIEW_JSON_LOG_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("INTERVIEW_OBSERVABILITY")
            .map(|value| parse_bool_env(&value).unwrap_or(true))
            .unwrap_or(true);
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            enabled,
            level: non_empty("INTERVIEW_LOG_LEVEL"),
            json_log_path: non_empty("INTERVIEW_JSON_LOG_PATH").map(PathBuf::from),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        if let Some(level) = &self.level
            && let Ok(filter) = EnvFilter::try_new(level)
        {
            return filter;
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Installs the global tracing subscriber once per process.
///
/// Console logs go to stderr so streamed answers on stdout stay clean. When
/// `INTERVIEW_JSON_LOG_PATH` is set, logs are written there as JSONL instead.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let settings = ObservabilitySettings::from_env();
        if !settings.enabled {
            return;
        }
        let env_filter = settings.env_filter();

        if let Some(path) = &settings.json_log_path {
            let (dir, file_name) = split_log_path(path);
            let _ = std::fs::create_dir_all(&dir);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(false)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_NAME)
        .to_string();
    (dir, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> ObservabilitySettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilitySettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_enabled_console_logging() {
        assert_eq!(
            settings(&[]),
            ObservabilitySettings {
                enabled: true,
                level: None,
                json_log_path: None,
            }
        );
    }

    #[test]
    fn reads_interview_variables() {
        let s = settings(&[
            ("INTERVIEW_OBSERVABILITY", "off"),
            ("INTERVIEW_LOG_LEVEL", "debug"),
            ("INTERVIEW_JSON_LOG_PATH", "logs/run.jsonl"),
        ]);
        assert!(!s.enabled);
        assert_eq!(s.level.as_deref(), Some("debug"));
        assert_eq!(
            split_log_path(s.json_log_path.as_deref().expect("path")),
            (PathBuf::from("logs"), "run.jsonl".to_string())
        );
        assert!(settings(&[("INTERVIEW_OBSERVABILITY", "maybe")]).enabled);
    }

    #[test]
    fn bare_file_name_logs_to_current_dir() {
        assert_eq!(
            split_log_path(Path::new("out.jsonl")),
            (PathBuf::from("."), "out.jsonl".to_string())
        );
    }
}
