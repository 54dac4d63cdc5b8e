use std::fs;
use std::path::{Path, PathBuf};

use steadfast_types::{ConfigError, SteadfastConfig};

const CONFIG_FILE: &str = "steadfast.json";
const DATA_DIR: &str = "steadfast";

/// Get the data directory path, creating it on first use.
///
/// `STEADFAST_DATA_DIR` takes precedence over the platform data directory.
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    let data_dir = if let Ok(custom_dir) = std::env::var("STEADFAST_DATA_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let base = dirs::data_dir().ok_or_else(|| ConfigError::NotFound {
            message: "cannot resolve the platform data directory".to_string(),
        })?;
        base.join(DATA_DIR)
    };

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir).map_err(|e| ConfigError::Io {
            message: format!("failed to create {}: {}", data_dir.display(), e),
        })?;
    }

    Ok(data_dir)
}

/// Load configuration from the data directory, then apply environment overrides.
pub fn load_config() -> Result<SteadfastConfig, ConfigError> {
    let mut config = load_config_from(&get_data_dir()?)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Load `steadfast.json` from `dir`. A missing file yields defaults.
pub fn load_config_from(dir: &Path) -> Result<SteadfastConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        return Ok(SteadfastConfig::new());
    }

    let content = fs::read_to_string(&config_path)
        .map_err(|e| ConfigError::Io { message: format!("failed to read config: {}", e) })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse { message: e.to_string() })
}

pub fn save_config(config: &SteadfastConfig) -> Result<(), ConfigError> {
    save_config_to(&get_data_dir()?, config)
}

pub fn save_config_to(dir: &Path, config: &SteadfastConfig) -> Result<(), ConfigError> {
    config.validate()?;
    let config_path = dir.join(CONFIG_FILE);
    let temp_path = dir.join(format!("{}.tmp", CONFIG_FILE));

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Parse { message: e.to_string() })?;

    // Atomic write
    fs::write(&temp_path, content)
        .map_err(|e| ConfigError::Io { message: format!("failed to write temp config: {}", e) })?;
    fs::rename(&temp_path, &config_path)
        .map_err(|e| ConfigError::Io { message: format!("failed to save config: {}", e) })
}

/// Overlay `STEADFAST_*` variables. Unparseable numbers are ignored with a warning.
pub fn apply_env_overrides<F>(config: &mut SteadfastConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("STEADFAST_DATABASE_URL") {
        config.primary.database_url = Some(url);
    }
    if let Some(url) = lookup("STEADFAST_SECONDARY_URL") {
        config.secondary.base_url = Some(url);
    }
    if let Some(key) = lookup("STEADFAST_SECONDARY_API_KEY") {
        config.secondary.api_key = Some(key);
    }
    if let Some(raw) = lookup("STEADFAST_PROBE_INTERVAL_SECS") {
        match raw.parse::<u64>() {
            Ok(secs) => config.health.probe_interval_secs = secs,
            Err(_) => tracing::warn!(value = %raw, "Ignoring invalid STEADFAST_PROBE_INTERVAL_SECS"),
        }
    }
}
