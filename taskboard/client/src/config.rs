use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Client settings, read from `TASKBOARD_*` environment variables.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// JSON file holding the session tokens and list preferences.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            state_file: default_state_file(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("TASKBOARD"))
            .build()?;

        let config: ClientConfig = settings.try_deserialize()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_state_file() -> PathBuf {
    PathBuf::from("taskboard-state.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_server() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:5000");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.state_file, PathBuf::from("taskboard-state.json"));
    }
}
