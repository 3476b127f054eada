//! Handles application configuration loading and management.
//!
//! This module defines the `AppConfig` struct which holds the media base path,
//! slide count, override store location, probe extension lists and timing
//! parameters. It provides `load_config` to read these settings from an INI file.
//! Every key is optional; missing keys keep their defaults.

use configparser::ini::Ini;
use super::errors::ConfigError;
use log::{info, debug, error};
use std::path::PathBuf;
use std::time::Duration;

const SECTION: &str = "settings";

/// Holds the application's configuration parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// Prefix for probed media, `{media_base_path}{index}.{ext}`.
    pub media_base_path: String,
    pub slide_count: u32,
    /// File backing the local key-value store.
    pub store_path: PathBuf,
    /// Probe order for videos; earlier entries win.
    pub video_extensions: Vec<String>,
    /// Probe order for images, tried only when no video exists.
    pub image_extensions: Vec<String>,
    /// Duration of the enter/exit visual treatment.
    pub transition: Duration,
    pub attach_retry_interval: Duration,
    pub attach_max_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            media_base_path: "./media/".to_string(),
            slide_count: 32,
            store_path: PathBuf::from("slideshow_store.json"),
            video_extensions: ["mp4", "webm", "ogg"].iter().map(|s| s.to_string()).collect(),
            image_extensions: ["jpg", "jpeg", "png", "webp", "gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            transition: Duration::from_millis(800),
            attach_retry_interval: Duration::from_millis(100),
            attach_max_attempts: 50,
        }
    }
}

/// Loads application configuration from the specified INI file path.
///
/// Reads settings from the `[settings]` section of the INI file.
///
/// # Errors
/// Returns `ConfigError` if the file cannot be read, is malformed,
/// or if a numeric key holds something that is not a number.
#[must_use = "loading configuration can fail, the Result must be handled"]
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Attempting to load config from: {}", path);
    let text = std::fs::read_to_string(path).map_err(|e| {
        error!("Error reading config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config = config_from_str(&text)?;
    info!("Configuration loaded successfully from {}: {:?}", path, config);
    Ok(config)
}

/// Parses INI text into an `AppConfig`, starting from the defaults.
pub fn config_from_str(text: &str) -> Result<AppConfig, ConfigError> {
    let mut parser = Ini::new();
    parser.read(text.to_string()).map_err(|e| {
        error!("Error parsing config: {}", e);
        ConfigError::Parse(e)
    })?;

    let mut config = AppConfig::default();

    if let Some(base) = parser.get(SECTION, "media_base_path") {
        debug!("Loaded config value for key 'media_base_path': {}", base);
        config.media_base_path = base;
    }
    if let Some(store) = parser.get(SECTION, "store_path") {
        debug!("Loaded config value for key 'store_path': {}", store);
        config.store_path = PathBuf::from(store);
    }
    if let Some(count) = get_number(&parser, "slide_count")? {
        config.slide_count = u32::try_from(count).map_err(|_| invalid("slide_count", count))?;
    }
    if let Some(list) = get_list(&parser, "video_extensions") {
        config.video_extensions = list;
    }
    if let Some(list) = get_list(&parser, "image_extensions") {
        config.image_extensions = list;
    }
    if let Some(ms) = get_number(&parser, "transition_ms")? {
        config.transition = Duration::from_millis(ms);
    }
    if let Some(ms) = get_number(&parser, "attach_retry_interval_ms")? {
        config.attach_retry_interval = Duration::from_millis(ms);
    }
    if let Some(n) = get_number(&parser, "attach_max_attempts")? {
        // At least one readiness check always happens.
        let attempts = u32::try_from(n).map_err(|_| invalid("attach_max_attempts", n))?;
        config.attach_max_attempts = attempts.max(1);
    }

    Ok(config)
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }
}

fn get_number(parser: &Ini, key: &str) -> Result<Option<u64>, ConfigError> {
    match parser.get(SECTION, key) {
        None => Ok(None),
        Some(raw) => {
            let value = raw.trim().parse::<u64>().map_err(|_| {
                error!("Configuration key '{}' is not a number: '{}'", key, raw);
                invalid(key, &raw)
            })?;
            debug!("Loaded config value for key '{}': {}", key, value);
            Ok(Some(value))
        }
    }
}

/// Comma separated, leading dots and blanks dropped, lowercased.
fn get_list(parser: &Ini, key: &str) -> Option<Vec<String>> {
    let raw = parser.get(SECTION, key)?;
    let list: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    debug!("Loaded config value for key '{}': {:?}", key, list);
    Some(list)
}
