use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ReplayError, Result};
use crate::model::span::FieldLayout;
use crate::replay::{ReplayOptions, TraceIdPolicy};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub layout: FieldLayout,
    pub trace_id_policy: TraceIdPolicy,
    pub seed: Option<String>,
    pub registry_path: Option<PathBuf>,
    pub max_seed_attempts: u32,
    pub pretty: bool,
}

impl Default for Config {
    fn default() -> Self {
        let options = ReplayOptions::default();
        Self {
            layout: options.layout,
            trace_id_policy: options.trace_id_policy,
            seed: options.seed,
            registry_path: None,
            max_seed_attempts: options.max_seed_attempts,
            pretty: true,
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

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            layout: self.layout,
            trace_id_policy: self.trace_id_policy,
            seed: self.seed.clone(),
            max_seed_attempts: self.max_seed_attempts,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    layout: Option<String>,
    trace_id_policy: Option<String>,
    seed: Option<String>,
    registry_path: Option<PathBuf>,
    max_seed_attempts: Option<u32>,
    pretty: Option<bool>,
}

pub fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRACE_REPLAY_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("trace-replay/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| ReplayError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| ReplayError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let max_seed_attempts = match env::var("TRACE_REPLAY_MAX_SEED_ATTEMPTS") {
        Ok(v) => Some(v.parse::<u32>().map_err(|e| {
            ReplayError::Config(format!(
                "bad TRACE_REPLAY_MAX_SEED_ATTEMPTS in environment: {e}"
            ))
        })?),
        Err(_) => None,
    };
    let pretty = match env::var("TRACE_REPLAY_PRETTY") {
        Ok(v) => Some(parse_bool(&v).ok_or_else(|| {
            ReplayError::Config(format!(
                "bad TRACE_REPLAY_PRETTY in environment: expected a boolean (value={v})"
            ))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        layout: env::var("TRACE_REPLAY_LAYOUT").ok(),
        trace_id_policy: env::var("TRACE_REPLAY_TRACE_ID_POLICY").ok(),
        seed: env::var("TRACE_REPLAY_SEED").ok(),
        registry_path: env::var("TRACE_REPLAY_REGISTRY").ok().map(PathBuf::from),
        max_seed_attempts,
        pretty,
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.layout {
        cfg.layout = v.parse::<FieldLayout>().map_err(|e| {
            ReplayError::Config(format!("bad layout in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.trace_id_policy {
        cfg.trace_id_policy = v.parse::<TraceIdPolicy>().map_err(|e| {
            ReplayError::Config(format!("bad trace_id_policy in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.seed {
        if v.is_empty() {
            return Err(ReplayError::Config(format!(
                "bad seed in {source}: seed cannot be empty"
            )));
        }
        cfg.seed = Some(v);
    }
    if let Some(v) = overrides.registry_path {
        cfg.registry_path = Some(v);
    }
    if let Some(v) = overrides.max_seed_attempts {
        if v == 0 {
            return Err(ReplayError::Config(format!(
                "bad max_seed_attempts in {source}: must be at least 1"
            )));
        }
        cfg.max_seed_attempts = v;
    }
    if let Some(v) = overrides.pretty {
        cfg.pretty = v;
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
