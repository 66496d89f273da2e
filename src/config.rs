//! Configuration System
//!
//! Loads tool settings from a TOML file, with environment variable overrides.
//! Every section has defaults, so an empty file is a valid config.

use crate::convert::{ConvertOptions, MatcherConfig, OrderCheck};
use crate::slog::{CompressionType, TreeConfig, DEFAULT_FANOUT, DEFAULT_LEAF_BYTE_CAP};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tree: TreeSection,

    #[serde(default)]
    pub conversion: ConversionSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Shape of the SLOG-2 tree being written
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreeSection {
    /// Leaf size in bytes; also accepts strings such as "64k"
    #[serde(default = "default_leaf_byte_cap", deserialize_with = "de_byte_size")]
    pub leaf_byte_cap: u64,

    #[serde(default = "default_fanout")]
    pub fanout: u32,

    #[serde(default)]
    pub compression: CompressionType,

    #[serde(default)]
    pub prune_unused_categories: bool,

    #[serde(default)]
    pub removed_categories: Vec<i32>,
}

fn default_leaf_byte_cap() -> u64 {
    DEFAULT_LEAF_BYTE_CAP
}

fn default_fanout() -> u32 {
    DEFAULT_FANOUT
}

impl Default for TreeSection {
    fn default() -> Self {
        Self {
            leaf_byte_cap: default_leaf_byte_cap(),
            fanout: default_fanout(),
            compression: CompressionType::default(),
            prune_unused_categories: false,
            removed_categories: Vec::new(),
        }
    }
}

/// CLOG-2 conversion behaviour
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConversionSection {
    #[serde(default)]
    pub order_check: OrderCheck,

    /// Bound on partial drawables per matcher list
    #[serde(default)]
    pub max_pending: Option<usize>,

    /// Convert logs of unknown versions
    #[serde(default)]
    pub force: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ByteSize {
    Bytes(u64),
    Text(String),
}

fn de_byte_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match ByteSize::deserialize(deserializer)? {
        ByteSize::Bytes(n) => Ok(n),
        ByteSize::Text(s) => parse_byte_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a size such as `4096`, `64k` or `2M` (binary units)
pub fn parse_byte_size(s: &str) -> Result<u64, ConfigError> {
    let s = s.trim();
    let (digits, multiplier) = match s.chars().last() {
        Some('k' | 'K') => (&s[..s.len() - 1], 1024),
        Some('m' | 'M') => (&s[..s.len() - 1], 1024 * 1024),
        _ => (s, 1),
    };
    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| ConfigError::Invalid(format!("not a byte size: {:?}", s)))
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Defaults plus environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("slog2").join("config.toml")),
            Some(PathBuf::from("/etc/slog2/config.toml")),
            Some(PathBuf::from("./slog2.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load `path` when given, else the default locations
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_with_env(p),
            None => Ok(Self::load_default()),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `SLOG2_*` settings looked up through `lookup`
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(cap) = lookup("SLOG2_LEAF_BYTES") {
            match parse_byte_size(&cap) {
                Ok(n) => self.tree.leaf_byte_cap = n,
                Err(e) => tracing::warn!("Ignoring SLOG2_LEAF_BYTES: {}", e),
            }
        }
        if let Some(fanout) = lookup("SLOG2_FANOUT") {
            match fanout.parse() {
                Ok(n) => self.tree.fanout = n,
                Err(_) => tracing::warn!("Ignoring SLOG2_FANOUT: {:?} is not a number", fanout),
            }
        }

        if let Some(level) = lookup("SLOG2_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SLOG2_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    pub fn to_tree_config(&self) -> TreeConfig {
        TreeConfig {
            leaf_byte_cap: self.tree.leaf_byte_cap,
            fanout: self.tree.fanout,
            compression: self.tree.compression,
            prune_unused_categories: self.tree.prune_unused_categories,
            removed_categories: self.tree.removed_categories.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    pub fn to_convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            tree: self.to_tree_config(),
            matcher: MatcherConfig {
                max_pending: self.conversion.max_pending,
            },
            order_check: self.conversion.order_check,
            force: self.conversion.force,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# slog2 Configuration
#
# Environment variables override these settings:
# - SLOG2_LEAF_BYTES
# - SLOG2_FANOUT
# - SLOG2_LOG_LEVEL
# - SLOG2_LOG_FORMAT

[tree]
# Leaf node size cap; a number of bytes or a size like "64k"
leaf_byte_cap = "64k"

# Children per internal node
fanout = 2

# Block compression: none or lz4
compression = "lz4"

# Leave out categories no drawable uses
prune_unused_categories = false

# Category indexes whose drawables are dropped
removed_categories = []

[conversion]
# Drawables must come out in end-time order: off, strict or lenient
order_check = "lenient"

# Bound on unmatched partial drawables kept per list
# max_pending = 1000000

# Convert logs with an unknown CLOG version
force = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty or json
format = "pretty"
"#
    .to_string()
}
