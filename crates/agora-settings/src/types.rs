//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every section is `#[serde(default)]`, so a
//! settings file only needs the keys it changes.

use std::collections::BTreeMap;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "auth": { "jwtSecret": "..." },
///   "logging": { "level": "debug", "modules": { "agora_server": "trace" } }
/// }
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgoraSettings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl AgoraSettings {
    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.auth.jwt_secret.expose_secret().is_empty() {
            return Err(crate::SettingsError::InvalidValue(
                "auth.jwtSecret must be set (or AGORA_JWT_SECRET)".into(),
            ));
        }
        if self.server.max_send_queue == 0 {
            return Err(crate::SettingsError::InvalidValue(
                "server.maxSendQueue must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP + WebSocket port. 0 picks an ephemeral port.
    pub port: u16,
    /// Per-connection outbound queue depth. A full queue drops the frame.
    pub max_send_queue: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_send_queue: 256,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HS256 signing secret shared with the REST layer.
    #[serde(serialize_with = "serialize_secret", deserialize_with = "deserialize_secret")]
    pub jwt_secret: SecretString,
    /// Reject tokens whose subject is not a row in the users table.
    pub require_known_user: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: SecretString::from(String::new()),
            require_known_user: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// SQLite database path. Relative paths resolve under `~/.agora`.
    pub db_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: "agora.db".to_string(),
        }
    }
}

impl StoreSettings {
    pub fn resolved_db_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.db_path);
        if path.is_absolute() {
            path
        } else {
            crate::loader::agora_home().join(path)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`trace`..`error`). `RUST_LOG` wins when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module overrides, e.g. `{"agora_store": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}

fn serialize_secret<S: Serializer>(secret: &SecretString, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(d: D) -> Result<SecretString, D::Error> {
    String::deserialize(d).map(SecretString::from)
}
