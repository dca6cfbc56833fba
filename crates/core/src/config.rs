use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpantailError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub page_size: usize,
    pub load_more_threshold_px: f32,
    pub poll_interval: Duration,
    pub filter_debounce: Duration,
    pub start_expanded: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: 50,
            load_more_threshold_px: 300.0,
            poll_interval: Duration::from_secs(2),
            filter_debounce: Duration::from_millis(200),
            start_expanded: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    page_size: Option<usize>,
    load_more_threshold_px: Option<f32>,
    poll_interval: Option<String>,
    filter_debounce: Option<String>,
    start_expanded: Option<bool>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("SPANTAIL_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("spantail/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| SpantailError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| SpantailError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let page_size = match env::var("SPANTAIL_PAGE_SIZE") {
        Ok(v) => Some(v.parse::<usize>().map_err(|e| {
            SpantailError::Config(format!("bad SPANTAIL_PAGE_SIZE in environment: {e}"))
        })?),
        Err(_) => None,
    };
    let load_more_threshold_px = match env::var("SPANTAIL_LOAD_MORE_THRESHOLD_PX") {
        Ok(v) => Some(v.parse::<f32>().map_err(|e| {
            SpantailError::Config(format!(
                "bad SPANTAIL_LOAD_MORE_THRESHOLD_PX in environment: {e}"
            ))
        })?),
        Err(_) => None,
    };
    let start_expanded = match env::var("SPANTAIL_START_EXPANDED") {
        Ok(v) => Some(matches!(
            v.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        page_size,
        load_more_threshold_px,
        poll_interval: env::var("SPANTAIL_POLL_INTERVAL").ok(),
        filter_debounce: env::var("SPANTAIL_FILTER_DEBOUNCE").ok(),
        start_expanded,
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.page_size {
        if v == 0 {
            return Err(SpantailError::Config(format!(
                "page_size in {source} must be positive"
            )));
        }
        cfg.page_size = v;
    }
    if let Some(v) = overrides.load_more_threshold_px {
        cfg.load_more_threshold_px = v;
    }
    if let Some(v) = overrides.poll_interval {
        cfg.poll_interval = humantime::parse_duration(&v).map_err(|e| {
            SpantailError::Config(format!("bad poll_interval in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.filter_debounce {
        cfg.filter_debounce = humantime::parse_duration(&v).map_err(|e| {
            SpantailError::Config(format!("bad filter_debounce in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.start_expanded {
        cfg.start_expanded = v;
    }
    Ok(())
}
