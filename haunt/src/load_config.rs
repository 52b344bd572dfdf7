/// `load_config` module: Loads a static YAML config and adapts it into the settings the CLI
/// needs (server endpoint, transfer tuning, folder selection rules).
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into type-safe structs
/// - Fill defaults for every omitted section, so an empty file is a valid config
/// - Inject deployment values from the environment (`HAUNT_SERVER_URL` overrides `server.base_url`)
/// - Reject values the pipeline cannot work with (zero chunk size, empty base URL)
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use haunt_core::config::{TransferConfig, DEFAULT_CHUNK_SIZE};
use serde::Deserialize;
use std::fs;
use std::num::NonZeroU64;
use std::path::Path;
use tracing::{error, info};

/// Environment variable overriding `server.base_url`.
pub const SERVER_URL_ENV: &str = "HAUNT_SERVER_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Extensions accepted when a folder is scanned.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] =
    &[".py", ".js", ".env", ".json", ".php", ".yaml", ".yml", ".ts"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub transfer: TransferSection,
    #[serde(default)]
    pub selection: SelectionSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds. Omit to wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferSection {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionSection {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for SelectionSection {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE.get()
}

fn default_allowed_extensions() -> Vec<String> {
    DEFAULT_ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

impl CliConfig {
    /// Core transfer settings derived from this config.
    pub fn transfer_config(&self) -> Result<TransferConfig> {
        match NonZeroU64::new(self.transfer.chunk_size) {
            Some(size) => Ok(TransferConfig::new(size)),
            None => {
                error!("transfer.chunk_size must be greater than zero");
                anyhow::bail!("transfer.chunk_size must be greater than zero")
            }
        }
    }

    /// Applies environment overrides and validates the result.
    fn finish(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            info!(base_url = %url, "Server URL overridden from environment");
            self.server.base_url = url;
        }
        self.server.base_url = self.server.base_url.trim_end_matches('/').to_string();
        if self.server.base_url.is_empty() {
            error!("server.base_url is empty");
            anyhow::bail!("server.base_url must not be empty");
        }
        self.transfer_config()?;
        Ok(self)
    }
}

/// Loads the YAML config at `path`, or the defaults when no path is given, then applies
/// environment overrides.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<CliConfig> {
    let Some(path) = path else {
        info!("No config file given, using defaults");
        return CliConfig::default().finish();
    };
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty document deserializes to unit, not to a mapping.
    let raw: CliConfig = if config_content.trim().is_empty() {
        CliConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    let config = raw.finish()?;
    info!(
        base_url = %config.server.base_url,
        chunk_size = config.transfer.chunk_size,
        extensions = config.selection.allowed_extensions.len(),
        "Config loaded and merged successfully"
    );
    Ok(config)
}
