use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::DataPilotError;
use crate::registry::RefreshPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "datapilot.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub refresh_policy: Option<RefreshPolicy>,
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub api_base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub refresh_policy: Option<RefreshPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Normalized, never ends with `/`.
    pub api_base_url: String,
    pub timeout: Duration,
    pub refresh_policy: RefreshPolicy,
}

impl ClientConfig {
    pub fn new(api_base_url: &str) -> Result<Self, DataPilotError> {
        Ok(Self {
            api_base_url: normalize_base_url(api_base_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            refresh_policy: RefreshPolicy::default(),
        })
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&Utf8Path>,
        overrides: ConfigOverrides,
    ) -> Result<ClientConfig, DataPilotError> {
        let file = Self::load_file(path)?;
        Self::resolve_config(file, overrides)
    }

    /// Reads an explicit config path, or the first default location that exists.
    pub fn load_file(path: Option<&Utf8Path>) -> Result<ConfigFile, DataPilotError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_locations()
                .into_iter()
                .find(|candidate| candidate.as_std_path().is_file())
            {
                Some(found) => found,
                None => return Ok(ConfigFile::default()),
            },
        };

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| DataPilotError::ConfigRead(config_path.clone().into_std_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| DataPilotError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        file: ConfigFile,
        overrides: ConfigOverrides,
    ) -> Result<ClientConfig, DataPilotError> {
        let raw_url = overrides
            .api_base_url
            .or(file.api_base_url)
            .ok_or(DataPilotError::MissingBaseUrl)?;
        let api_base_url = normalize_base_url(&raw_url)?;

        let timeout_secs = overrides
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(DataPilotError::ConfigParse(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(ClientConfig {
            api_base_url,
            timeout: Duration::from_secs(timeout_secs),
            refresh_policy: overrides
                .refresh_policy
                .or(file.refresh_policy)
                .unwrap_or_default(),
        })
    }
}

/// Project-local file first, then the per-user config directory.
pub fn default_locations() -> Vec<Utf8PathBuf> {
    let mut locations = vec![Utf8PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(user) = ProjectDirs::from("", "", "datapilot")
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.config_dir().join("config.json")).ok())
    {
        locations.push(user);
    }
    locations
}

pub fn normalize_base_url(raw: &str) -> Result<String, DataPilotError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(DataPilotError::MissingBaseUrl);
    }
    let has_scheme = trimmed.starts_with("http://") || trimmed.starts_with("https://");
    let has_host = trimmed
        .split_once("://")
        .map(|(_, rest)| !rest.is_empty())
        .unwrap_or(false);
    if !has_scheme || !has_host {
        return Err(DataPilotError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(trimmed.to_string())
}
