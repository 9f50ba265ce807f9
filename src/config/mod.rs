use log::warn;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Clone, Debug)]
pub struct Config {
    pub prompt: String,
    pub history_file: Option<PathBuf>,
    /// Upper bound on how long a finished background job can go unnoticed
    /// if its SIGCHLD is missed.
    pub poll_interval: Duration,
    pub announce_foreground: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prompt: String::new(),
            history_file: dirs::home_dir().map(|home| home.join(".msh_history")),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            announce_foreground: false,
        }
    }
}

impl Config {
    /// Builds the configuration from `MSH_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(prompt) = lookup("MSH_PROMPT") {
            config.prompt = prompt;
        }

        if let Some(path) = lookup("MSH_HISTORY_FILE") {
            config.history_file = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        if let Some(raw) = lookup("MSH_POLL_INTERVAL_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.poll_interval = Duration::from_millis(ms.max(1)),
                Err(e) => warn!("ignoring MSH_POLL_INTERVAL_MS={:?}: {}", raw, e),
            }
        }

        if let Some(raw) = lookup("MSH_ANNOUNCE_FOREGROUND") {
            config.announce_foreground = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        config
    }
}
