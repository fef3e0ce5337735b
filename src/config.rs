use crate::constants::{API_KEY_ENV, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, GEMINI_API_URL};
use crate::errors::{IntellexError, IntellexResult};
use crate::models::ModelId;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginConfig {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: String,
    pub model: ModelId,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub export_dir: Option<PathBuf>,
    pub speak_responses: bool,
    pub speech_command: Option<String>,
    pub transcriber_command: Option<String>,
    pub login: Option<LoginConfig>,
    /// Set when `api_key` came from the environment; such a key is never
    /// written to the config file.
    #[serde(skip)]
    pub key_from_env: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: ModelId::from(DEFAULT_MODEL),
            api_base_url: GEMINI_API_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_level: "info".to_string(),
            export_dir: None,
            speak_responses: true,
            speech_command: None,
            transcriber_command: None,
            login: None,
            key_from_env: false,
        }
    }
}

static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Loads the config from `~/.config/intellex/config.json`, creating it with
/// defaults on first run, and installs it as the process-wide config.
pub fn initialize_config() -> IntellexResult<Config> {
    let config_path = get_config_path()?;
    let mut config = load_or_create(&config_path)?;

    if let Ok(key) = env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            config.api_key = key;
            config.key_from_env = true;
        }
    }

    validate_config(&config)?;
    set_global(config.clone());
    Ok(config)
}

/// Reads the config at `path`, or writes a default one there when missing.
pub fn load_or_create(path: &Path) -> IntellexResult<Config> {
    if path.exists() {
        let config_str = fs::read_to_string(path)
            .map_err(|e| IntellexError::config_error(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&config_str)
            .map_err(|e| IntellexError::config_error(format!("Failed to parse config: {}", e)))
    } else {
        let config = Config::default();
        write_config(path, &config)?;
        Ok(config)
    }
}

fn write_config(path: &Path, config: &Config) -> IntellexResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            IntellexError::config_error(format!("Failed to create config directory: {}", e))
        })?;
    }

    let config_str = serde_json::to_string_pretty(config)
        .map_err(|e| IntellexError::config_error(format!("Failed to serialize config: {}", e)))?;

    fs::write(path, config_str)
        .map_err(|e| IntellexError::config_error(format!("Failed to write config file: {}", e)))
}

/// Directory holding the config file, logs and default exports.
pub fn config_dir() -> IntellexResult<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| IntellexError::config_error("Could not determine home directory"))?;

    Ok(home_dir.join(".config").join("intellex"))
}

fn get_config_path() -> IntellexResult<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

pub fn validate_config(config: &Config) -> IntellexResult<()> {
    if config.api_key.trim().is_empty() {
        return Err(IntellexError::config_error(format!(
            "API key is required (set {} or add it to the config file)",
            API_KEY_ENV
        )));
    }

    if config.model.as_str().trim().is_empty() {
        return Err(IntellexError::config_error("Model name is required"));
    }

    if config.api_base_url.trim().is_empty() {
        return Err(IntellexError::config_error("api_base_url must not be empty"));
    }

    if config.request_timeout_secs == 0 {
        return Err(IntellexError::config_error(
            "request_timeout_secs must be greater than 0",
        ));
    }

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        return Err(IntellexError::config_error(format!(
            "log_level must be one of {}",
            LOG_LEVELS.join(", ")
        )));
    }

    Ok(())
}

pub fn get_config() -> Config {
    CONFIG
        .read()
        .map(|config| config.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

fn set_global(config: Config) {
    match CONFIG.write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// Validates and persists `updated_config`, then makes it the active config.
pub fn update_config(updated_config: Config) -> IntellexResult<()> {
    update_config_at(&get_config_path()?, updated_config)
}

/// Same as `update_config` for a config file at `path`.
pub fn update_config_at(path: &Path, updated_config: Config) -> IntellexResult<()> {
    validate_config(&updated_config)?;

    if updated_config.key_from_env {
        let stored_key = if path.exists() {
            load_or_create(path)?.api_key
        } else {
            String::new()
        };
        let on_disk = Config {
            api_key: stored_key,
            ..updated_config.clone()
        };
        write_config(path, &on_disk)?;
    } else {
        write_config(path, &updated_config)?;
    }

    set_global(updated_config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // tests that install a global config run one at a time
    static GLOBAL: Mutex<()> = Mutex::new(());

    fn valid_config() -> Config {
        Config {
            api_key: "test-api-key".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_validate_config_valid() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_config_invalid_empty_api_key() {
        let config = Config::default();
        assert!(matches!(
            validate_config(&config),
            Err(IntellexError::Config(_))
        ));
    }

    #[test]
    fn test_validate_config_invalid_timeout() {
        let mut config = valid_config();
        config.request_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_invalid_log_level() {
        let mut config = valid_config();
        config.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = load_or_create(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = load_or_create(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "api_key": "abc", "model": "gemini-1.5-pro" }"#).unwrap();

        let config = load_or_create(&path).unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.model, ModelId::Gemini15Pro);
        assert_eq!(config.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.login.is_none());
    }

    #[test]
    fn test_update_config_persists_and_installs() {
        let _lock = GLOBAL.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = valid_config();
        config.model = ModelId::Gemini15Flash;

        update_config_at(&path, config.clone()).unwrap();

        assert_eq!(load_or_create(&path).unwrap().model, ModelId::Gemini15Flash);
        assert_eq!(get_config().model, ModelId::Gemini15Flash);
    }

    #[test]
    fn test_update_config_keeps_env_key_off_disk() {
        let _lock = GLOBAL.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "api_key": "stored-key" }"#).unwrap();

        let config = Config {
            api_key: "env-secret".to_string(),
            key_from_env: true,
            model: ModelId::Gemini15Pro,
            ..Config::default()
        };
        update_config_at(&path, config).unwrap();

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("env-secret"));
        let reloaded = load_or_create(&path).unwrap();
        assert_eq!(reloaded.api_key, "stored-key");
        assert_eq!(reloaded.model, ModelId::Gemini15Pro);
    }

    #[test]
    fn test_update_config_rejects_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        assert!(update_config_at(&path, Config::default()).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_load_malformed_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_or_create(&path), Err(IntellexError::Config(_))));
    }
}
