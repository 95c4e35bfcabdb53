//! Process-wide tracing setup for the relay binary.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Filter used when neither `RELAY_LOG_LEVEL` nor `RUST_LOG` is usable.
/// Keeps the relay crates at debug so per-request model and usage lines show.
pub const DEFAULT_LOG_DIRECTIVE: &str =
    "info,mistral_relay=debug,mistral_relay_server=debug,tower_http=debug";

const DEFAULT_JSON_LOG_FILE: &str = "mistral-relay.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

/// Where log lines go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSink {
    Stdout,
    /// JSON lines appended to `dir/file_name`.
    JsonFile { dir: PathBuf, file_name: String },
}

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    pub directive: String,
    pub sink: LogSink,
}

impl LogSettings {
    /// Reads `RELAY_OBSERVABILITY_ENABLED`, `RELAY_LOG_LEVEL`, `RUST_LOG` and
    /// `RELAY_JSON_LOG_PATH` through `lookup`.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("RELAY_OBSERVABILITY_ENABLED")
            .and_then(|value| parse_bool_env(&value))
            .unwrap_or(true);
        let directive = ["RELAY_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(&lookup)
            .find(|value| EnvFilter::try_new(value).is_ok())
            .unwrap_or_else(|| DEFAULT_LOG_DIRECTIVE.to_string());
        let sink = lookup("RELAY_JSON_LOG_PATH")
            .filter(|path| !path.trim().is_empty())
            .map_or(LogSink::Stdout, |path| json_sink(Path::new(&path)));
        Self {
            enabled,
            directive,
            sink,
        }
    }

    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Splits a log path into the directory and file name the appender needs.
fn json_sink(path: &Path) -> LogSink {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE)
        .to_string();
    LogSink::JsonFile { dir, file_name }
}

/// Initialize logging once per process from [`LogSettings::from_env`].
///
/// Without `RELAY_JSON_LOG_PATH`, a compact console format with targets goes
/// to stdout.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let settings = LogSettings::from_env();
        if !settings.enabled {
            return;
        }
        let env_filter = EnvFilter::new(&settings.directive);

        match settings.sink {
            LogSink::JsonFile { dir, file_name } => {
                let _ = std::fs::create_dir_all(&dir);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            LogSink::Stdout => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stdout);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}
