//! # agora-settings
//!
//! Settings are loaded from three layers, lowest priority first:
//! 1. **Compiled defaults** ([`AgoraSettings::default()`])
//! 2. **User file**: `~/.agora/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `AGORA_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{agora_home, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
