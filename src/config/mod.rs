//! Configuration management.

use serde::Deserialize;
use std::path::Path;

/// Default capacity of the notification event bus.
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1024;

/// Default `tracing` filter directive.
pub const DEFAULT_LOG_FILTER: &str = "graphmux=info";

/// Main configuration for graphmux.
#[derive(Debug, Clone)]
pub struct GraphmuxConfig {
    /// Whether mutable graph handles are cached.
    pub caching_enabled: bool,
    /// Capacity of the notification event bus.
    pub event_bus_capacity: usize,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Providers registered at startup.
    pub providers: Vec<ProviderConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `tracing` filter directive (e.g. `graphmux=debug`).
    pub filter: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format string; anything other than `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// A provider registered at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name; breaks weight ties.
    pub name: String,
    /// Provider weight; higher wins.
    pub weight: i32,
    /// Name of the union graph, if any.
    #[serde(default)]
    pub union_graph: Option<String>,
    /// Whether the provider hands out natively lockable graphs.
    #[serde(default)]
    pub lockable_graphs: bool,
    /// Names the provider refuses to delete.
    #[serde(default)]
    pub undeletable: Vec<String>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Cache toggle.
    pub caching_enabled: Option<bool>,
    /// Event bus capacity.
    pub event_bus_capacity: Option<usize>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
    /// Provider entries.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Output format: "pretty" or "json".
    pub format: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Default for GraphmuxConfig {
    fn default() -> Self {
        Self {
            caching_enabled: true,
            event_bus_capacity: DEFAULT_EVENT_BUS_CAPACITY,
            logging: LoggingConfig::default(),
            providers: Vec::new(),
        }
    }
}

impl GraphmuxConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        Self::from_toml_str(&contents)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/graphmux/` on macOS)
    /// 2. XDG config dir (`~/.config/graphmux/`)
    ///
    /// Returns default configuration if no config file is found or the file
    /// cannot be parsed.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("graphmux").join("config.toml");
        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("graphmux")
            .join("config.toml");

        for path in [platform_config, xdg_config] {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Ignoring unreadable config file"
                    );
                },
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `GraphmuxConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(v) = file.caching_enabled {
            config.caching_enabled = v;
        }
        if let Some(v) = file.event_bus_capacity {
            config.event_bus_capacity = v;
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format);
            }
            if let Some(filter) = logging.filter {
                config.logging.filter = filter;
            }
        }
        config.providers = file.providers;

        config
    }

    /// Applies environment variable overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `GRAPHMUX_CACHING_ENABLED` | `caching_enabled` |
    /// | `GRAPHMUX_EVENT_BUS_CAPACITY` | `event_bus_capacity` |
    /// | `GRAPHMUX_LOG` | `logging.filter` |
    /// | `GRAPHMUX_LOG_FORMAT` | `logging.format` |
    ///
    /// Values that fail to parse are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("GRAPHMUX_CACHING_ENABLED")
            && let Some(parsed) = parse_bool(&v)
        {
            self.caching_enabled = parsed;
        }
        if let Ok(v) = std::env::var("GRAPHMUX_EVENT_BUS_CAPACITY")
            && let Ok(parsed) = v.trim().parse::<usize>()
        {
            self.event_bus_capacity = parsed;
        }
        if let Ok(v) = std::env::var("GRAPHMUX_LOG")
            && !v.trim().is_empty()
        {
            self.logging.filter = v;
        }
        if let Ok(v) = std::env::var("GRAPHMUX_LOG_FORMAT") {
            self.logging.format = LogFormat::parse(v.trim());
        }
        self
    }

    /// Disables or enables the handle cache.
    #[must_use]
    pub const fn with_caching_enabled(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    /// Adds a provider entry.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.push(provider);
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
