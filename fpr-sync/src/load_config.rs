/// `load_config` module: reads the static YAML settings file and pairs it with the service credential
/// taken from the environment.
///
/// The YAML file never holds secrets. The credential is read from:
/// - `FPR_SYNC_TOKEN`: a token obtained out of band, used as-is; or
/// - `FPR_SYNC_USERNAME` and `FPR_SYNC_PASSWORD`: exchanged once for a token at startup.
///
/// `FPR_SYNC_BASE_URL`, when set, overrides `service.base_url` from the file.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, bail, Result};
use fpr_sync_core::config::{Credential, SyncConfig};
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "fpr-sync.yaml";
pub const TOKEN_ENV: &str = "FPR_SYNC_TOKEN";
pub const USERNAME_ENV: &str = "FPR_SYNC_USERNAME";
pub const PASSWORD_ENV: &str = "FPR_SYNC_PASSWORD";
pub const BASE_URL_ENV: &str = "FPR_SYNC_BASE_URL";

#[derive(Debug)]
pub struct CliConfig {
    pub sync: SyncConfig,
    pub credential: Credential,
}

/// Loads the YAML settings file and resolves the credential from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let mut sync: SyncConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Some(base_url) = non_empty_var(BASE_URL_ENV) {
        info!(base_url = %base_url, "Overriding service.base_url from environment");
        sync.service.base_url = base_url;
    }
    validate(&sync)?;

    let credential = credential_from_env()?;
    Ok(CliConfig { sync, credential })
}

fn validate(sync: &SyncConfig) -> Result<()> {
    let base_url = sync.service.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        bail!("service.base_url must be an http(s) URL, got {base_url:?}");
    }
    if sync.service.page_size == 0 {
        bail!("service.page_size must be at least 1");
    }
    if sync.service.timeout_secs == 0 || sync.service.connect_timeout_secs == 0 {
        bail!("service timeouts must be at least 1 second");
    }
    Ok(())
}

/// A token wins over username/password when both are present.
pub fn credential_from_env() -> Result<Credential> {
    if let Some(token) = non_empty_var(TOKEN_ENV) {
        if non_empty_var(USERNAME_ENV).is_some() {
            warn!("Both {TOKEN_ENV} and {USERNAME_ENV} are set; using the token");
        }
        return Ok(Credential::Token(token));
    }
    match (non_empty_var(USERNAME_ENV), non_empty_var(PASSWORD_ENV)) {
        (Some(username), Some(password)) => Ok(Credential::Password { username, password }),
        (Some(_), None) => Err(anyhow!("{USERNAME_ENV} is set but {PASSWORD_ENV} is missing")),
        _ => {
            error!("No service credential found in environment");
            Err(anyhow!(
                "Missing credential: set {TOKEN_ENV}, or {USERNAME_ENV} and {PASSWORD_ENV}"
            ))
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
