use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use speech_client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use translator_core::DEFAULT_CREDENTIAL_WAIT;

pub const DEFAULT_AUTH_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TOKEN_BASE_URL: &str = "https://securetoken.googleapis.com/v1";
pub const DEFAULT_DOCUMENTS_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Runtime configuration, read from the environment after `.env` files have
/// been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub auth_base_url: String,
    pub token_base_url: String,
    pub documents_base_url: String,
    pub firebase_api_key: Option<String>,
    pub firebase_project_id: Option<String>,
    pub settings_path: PathBuf,
    pub credential_wait: Duration,
    pub http_timeout: Duration,
    /// Command used to play synthesized audio; the file path is its only argument.
    pub player: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        load_dotenv()?;
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let settings_path = match var("DMS_SETTINGS_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_settings_path()?,
        };

        Ok(Self {
            api_base_url: var("DMS_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            auth_base_url: var("DMS_AUTH_BASE_URL").unwrap_or_else(|| DEFAULT_AUTH_BASE_URL.to_string()),
            token_base_url: var("DMS_TOKEN_BASE_URL").unwrap_or_else(|| DEFAULT_TOKEN_BASE_URL.to_string()),
            documents_base_url: var("DMS_DOCUMENTS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_DOCUMENTS_BASE_URL.to_string()),
            firebase_api_key: var("DMS_FIREBASE_API_KEY"),
            firebase_project_id: var("DMS_FIREBASE_PROJECT_ID"),
            settings_path,
            credential_wait: match var("DMS_CREDENTIAL_WAIT_MS") {
                Some(raw) => Duration::from_millis(parse_number("DMS_CREDENTIAL_WAIT_MS", &raw)?),
                None => DEFAULT_CREDENTIAL_WAIT,
            },
            http_timeout: match var("DMS_HTTP_TIMEOUT_SECS") {
                Some(raw) => Duration::from_secs(parse_number("DMS_HTTP_TIMEOUT_SECS", &raw)?),
                None => DEFAULT_TIMEOUT,
            },
            player: var("DMS_PLAYER"),
        })
    }
}

/// Applies `.env` from the current directory, its parent and grandparent.
/// Variables already present in the process environment win.
pub fn load_dotenv() -> Result<()> {
    for candidate in [".env", "../.env", "../../.env"] {
        load_env_file_if_present(Path::new(candidate))?;
    }
    Ok(())
}

fn load_env_file_if_present(path: &Path) -> Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(anyhow!("Failed to load environment from {}: {err}", path.display())),
    }
}

fn default_settings_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory for settings file")?;
    Ok(home.join(".dms").join("settings.json"))
}

fn parse_number(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .with_context(|| format!("{name} must be a whole number, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_point_at_public_endpoints() {
        let config = config_from(&[("DMS_SETTINGS_PATH", "/tmp/dms.json")]).unwrap();
        assert_eq!(config.api_base_url, "https://api.openai.com/v1");
        assert_eq!(config.auth_base_url, DEFAULT_AUTH_BASE_URL);
        assert_eq!(config.token_base_url, DEFAULT_TOKEN_BASE_URL);
        assert_eq!(config.documents_base_url, DEFAULT_DOCUMENTS_BASE_URL);
        assert_eq!(config.credential_wait, Duration::from_secs(1));
        assert_eq!(config.http_timeout, Duration::from_secs(45));
        assert_eq!(config.firebase_api_key, None);
        assert_eq!(config.player, None);
    }

    #[test]
    fn overrides_are_trimmed_and_blank_values_ignored() {
        let config = config_from(&[
            ("DMS_SETTINGS_PATH", "/tmp/dms.json"),
            ("DMS_API_BASE_URL", " http://localhost:8080/v1 "),
            ("DMS_FIREBASE_API_KEY", "   "),
            ("DMS_CREDENTIAL_WAIT_MS", "250"),
            ("DMS_PLAYER", "afplay"),
        ])
        .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080/v1");
        assert_eq!(config.firebase_api_key, None);
        assert_eq!(config.credential_wait, Duration::from_millis(250));
        assert_eq!(config.settings_path, PathBuf::from("/tmp/dms.json"));
        assert_eq!(config.player.as_deref(), Some("afplay"));
    }

    #[test]
    fn malformed_number_is_an_error() {
        let err = config_from(&[("DMS_SETTINGS_PATH", "/tmp/x"), ("DMS_HTTP_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("DMS_HTTP_TIMEOUT_SECS"));
    }
}
