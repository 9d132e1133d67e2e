//! Logging bootstrap and in-process delivery counters.

mod stats;

pub use stats::{DeliveryStats, DeliveryStatsSnapshot, DropKind};

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "agora_server" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit one JSON object per line instead of human-readable text.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Filter directive string equivalent to this config, e.g.
    /// `info,agora_server=debug`.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Held for the life of the process. Owns the shared delivery counters and
/// the handle that retunes the installed log filter.
pub struct TelemetryGuard {
    stats: Arc<DeliveryStats>,
    filter: Option<FilterHandle>,
    levels: RwLock<FilterLevels>,
}

/// Base directives (from `RUST_LOG` or the configured level) plus the
/// per-module overrides layered on top.
struct FilterLevels {
    base: String,
    modules: Vec<(String, Level)>,
}

impl FilterLevels {
    fn directives(&self) -> String {
        let mut filter = self.base.clone();
        for (module, level) in &self.modules {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

impl TelemetryGuard {
    /// Guard with fresh counters and no subscriber behind it. Level changes
    /// are recorded but have nothing to apply to.
    pub fn detached() -> Self {
        Self {
            stats: Arc::new(DeliveryStats::new()),
            filter: None,
            levels: RwLock::new(FilterLevels {
                base: "info".into(),
                modules: Vec::new(),
            }),
        }
    }

    /// Set `module`'s level and reload the live filter.
    pub fn set_module_level(&self, module: &str, level: Level) {
        let directives = {
            let mut levels = self.levels.write();
            if let Some(entry) = levels.modules.iter_mut().find(|(m, _)| m == module) {
                entry.1 = level;
            } else {
                levels.modules.push((module.to_string(), level));
            }
            levels.directives()
        };
        let Some(handle) = &self.filter else {
            return;
        };
        match EnvFilter::try_new(&directives) {
            Ok(filter) => {
                if let Err(e) = handle.reload(filter) {
                    tracing::warn!(error = %e, "log filter reload failed");
                }
            }
            Err(e) => tracing::warn!(%directives, error = %e, "invalid log filter"),
        }
    }

    pub fn module_levels(&self) -> Vec<(String, Level)> {
        self.levels.read().modules.clone()
    }

    pub fn stats(&self) -> Arc<DeliveryStats> {
        Arc::clone(&self.stats)
    }
}

/// Subscriber plus its guard, not yet installed. A valid `env_directives`
/// (the `RUST_LOG` value) replaces the configured levels entirely.
fn build_subscriber(
    config: TelemetryConfig,
    env_directives: Option<String>,
) -> (impl Subscriber + Send + Sync, TelemetryGuard) {
    let from_env = env_directives
        .as_deref()
        .and_then(|d| EnvFilter::try_new(d).ok().map(|f| (d.to_string(), f)));
    let (levels, env_filter) = match from_env {
        Some((base, filter)) => (
            FilterLevels {
                base,
                modules: Vec::new(),
            },
            filter,
        ),
        None => {
            let filter = EnvFilter::new(config.filter_directives());
            (
                FilterLevels {
                    base: config.log_level.to_string().to_lowercase(),
                    modules: config.module_levels,
                },
                filter,
            )
        }
    };
    let (filter_layer, handle) = reload::Layer::new(env_filter);

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer);
    let guard = TelemetryGuard {
        stats: Arc::new(DeliveryStats::new()),
        filter: Some(handle),
        levels: RwLock::new(levels),
    };
    (subscriber, guard)
}

/// Install the global tracing subscriber. Call once at startup; a second
/// call leaves the first subscriber in place.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (subscriber, guard) = build_subscriber(config, env_directives);
    if let Err(e) = subscriber.try_init() {
        eprintln!("agora-telemetry: subscriber already installed: {e}");
    }
    guard
}

/// Parse a level name such as `debug` or `WARN`.
pub fn parse_level(s: &str) -> Option<Level> {
    s.trim().parse().ok()
}
