//! Settings loading with deep merge and environment variable overrides.
//!
//! 1. Start with [`AgoraSettings::default()`]
//! 2. Deep-merge `~/.agora/settings.json` (or an explicit path) over the defaults
//! 3. Apply `AGORA_*` environment overrides
//!
//! Objects merge per key, arrays and primitives are replaced, and nulls in the
//! file are skipped.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::AgoraSettings;

/// `~/.agora`, falling back to `/tmp/.agora` when `HOME` is unset.
pub fn agora_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".agora")
}

pub fn settings_path() -> PathBuf {
    agora_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<AgoraSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env var overrides. A missing file yields
/// defaults; a malformed one is an error.
pub fn load_settings_from_path(path: &Path) -> Result<AgoraSettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn load_file(path: &Path) -> Result<AgoraSettings> {
    let defaults = serde_json::to_value(AgoraSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `AGORA_*` overrides read through `lookup`. Invalid values are logged
/// and ignored.
pub fn apply_env_overrides<F>(settings: &mut AgoraSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(v) = env.string("AGORA_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("AGORA_PORT") {
        settings.server.port = v;
    }
    if let Some(v) = env.usize_range("AGORA_SEND_QUEUE", 1, 65_536) {
        settings.server.max_send_queue = v;
    }
    if let Some(v) = env.string("AGORA_JWT_SECRET") {
        settings.auth.jwt_secret = SecretString::from(v);
    }
    if let Some(v) = env.bool("AGORA_REQUIRE_KNOWN_USER") {
        settings.auth.require_known_user = v;
    }
    if let Some(v) = env.string("AGORA_DB_PATH") {
        settings.store.db_path = v;
    }
    if let Some(v) = env.string("AGORA_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("AGORA_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Accepts (case-insensitive) `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = val.parse::<u16>().ok();
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid port env var, ignoring");
        }
        result
    }

    fn usize_range(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}
