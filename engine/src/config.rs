use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use weft_client::ClientSettings;

use crate::session::SessionSettings;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_MODEL: &str = "x-ai/grok-4-fast:free";
pub const DEFAULT_MCP_SERVER: &str = "cmu_api";

pub const ENV_BACKEND_URL: &str = "WEFT_BACKEND_URL";
pub const ENV_MODEL: &str = "WEFT_MODEL";
pub const ENV_MCP_SERVER: &str = "WEFT_MCP_SERVER";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// `~/.weft/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WeftConfig {
    pub backend: BackendConfig,
    pub mcp: McpConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// `model_id` sent with each request.
    pub model: String,
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            connect_timeout_secs: weft_client::DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub enabled: bool,
    pub server: String,
    /// Let the backend run tools without asking.
    pub auto_approve: bool,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server: DEFAULT_MCP_SERVER.to_string(),
            auto_approve: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Seconds without a body chunk before giving up. 0 disables.
    pub idle_timeout_secs: u64,
    pub max_response_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 0,
            max_response_bytes: weft_client::DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl WeftConfig {
    /// Load `~/.weft/config.toml`. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Apply `WEFT_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(url) = get(ENV_BACKEND_URL) {
            self.backend.url = url;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.backend.model = model;
        }
        if let Some(server) = get(ENV_MCP_SERVER) {
            self.mcp.server = server;
        }
    }

    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        let model_id = non_empty_or(&self.backend.model, DEFAULT_MODEL);
        let mcp_server_type = non_empty_or(&self.mcp.server, DEFAULT_MCP_SERVER);
        SessionSettings {
            model_id,
            use_mcp: self.mcp.enabled,
            mcp_server_type,
            mcp_auto_approve: self.mcp.auto_approve,
        }
    }

    #[must_use]
    pub fn client_settings(&self) -> ClientSettings {
        let mut settings = ClientSettings::new(non_empty_or(&self.backend.url, DEFAULT_BACKEND_URL));
        if self.backend.connect_timeout_secs > 0 {
            settings.connect_timeout = Duration::from_secs(self.backend.connect_timeout_secs);
        }
        settings.idle_timeout = (self.stream.idle_timeout_secs > 0)
            .then(|| Duration::from_secs(self.stream.idle_timeout_secs));
        if self.stream.max_response_bytes > 0 {
            settings.max_response_bytes = self.stream.max_response_bytes;
        }
        settings
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".weft").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_yields_defaults() {
        let file = write_config("");
        let config = WeftConfig::load_from(file.path()).unwrap();
        assert_eq!(config, WeftConfig::default());
        assert_eq!(config.backend.url, DEFAULT_BACKEND_URL);
        assert_eq!(config.mcp.server, DEFAULT_MCP_SERVER);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let file = write_config(
            r#"
[backend]
model = "openai/gpt-4o"

[mcp]
enabled = true

[stream]
idle_timeout_secs = 45
"#,
        );
        let config = WeftConfig::load_from(file.path()).unwrap();
        assert_eq!(config.backend.model, "openai/gpt-4o");
        assert_eq!(config.backend.url, DEFAULT_BACKEND_URL);
        assert!(config.mcp.enabled);
        assert!(!config.mcp.auto_approve);

        let client = config.client_settings();
        assert_eq!(client.idle_timeout, Some(Duration::from_secs(45)));
        let session = config.session_settings();
        assert!(session.use_mcp);
        assert_eq!(session.model_id, "openai/gpt-4o");
    }

    #[test]
    fn zero_idle_timeout_disables_it() {
        let client = WeftConfig::default().client_settings();
        assert_eq!(client.idle_timeout, None);
        assert_eq!(client.base_url, DEFAULT_BACKEND_URL);
    }

    #[test]
    fn parse_error_names_the_file() {
        let file = write_config("[backend\nurl = 1");
        let err = WeftConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), file.path());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WeftConfig::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_win_and_blanks_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BACKEND_URL, "http://backend:9000"),
            (ENV_MODEL, "  "),
            (ENV_MCP_SERVER, "github"),
        ]);
        let mut config = WeftConfig::default();
        config.apply_overrides(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.backend.url, "http://backend:9000");
        assert_eq!(config.backend.model, DEFAULT_MODEL);
        assert_eq!(config.mcp.server, "github");
    }

    #[test]
    fn blank_values_resolve_to_defaults() {
        let mut config = WeftConfig::default();
        config.backend.model = String::new();
        config.mcp.server = " ".to_string();
        let session = config.session_settings();
        assert_eq!(session.model_id, DEFAULT_MODEL);
        assert_eq!(session.mcp_server_type, DEFAULT_MCP_SERVER);
    }
}
