//! Top-level calltrace configuration with layered resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{EntryPointConfig, ExtractionConfig, QueryConfig, ResolutionConfig, StorageConfig};
use crate::constants::{ENV_PREFIX, PROJECT_CONFIG_FILE, USER_CONFIG_DIR};
use crate::errors::ConfigError;

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`CALLTRACE_*`)
/// 3. Project config (`calltrace.toml` in project root)
/// 4. User config (`~/.calltrace/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CalltraceConfig {
    pub extraction: ExtractionConfig,
    pub resolution: ResolutionConfig,
    pub entry_points: EntryPointConfig,
    pub query: QueryConfig,
    pub storage: StorageConfig,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub threads: Option<usize>,
    pub max_depth: Option<u32>,
    pub in_memory_threshold: Option<usize>,
    pub cache_ttl_seconds: Option<u64>,
}

impl CalltraceConfig {
    /// Load configuration with layered resolution rooted at `root`.
    pub fn load(root: &Path, cli_overrides: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        Self::apply_env_overrides(&mut config);

        if let Some(cli) = cli_overrides {
            Self::apply_cli_overrides(&mut config, cli);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extraction.threads == Some(0) {
            return Err(invalid("extraction.threads", "must be greater than 0"));
        }
        for (field, value) in [
            (
                "resolution.low_rate_threshold",
                self.resolution.low_rate_threshold,
            ),
            (
                "resolution.regression_tolerance",
                self.resolution.regression_tolerance,
            ),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(invalid(field, "must be between 0.0 and 1.0"));
                }
            }
        }
        if self.query.max_depth == Some(0) {
            return Err(invalid("query.max_depth", "must be greater than 0"));
        }
        if self.query.cache_capacity == Some(0) {
            return Err(invalid("query.cache_capacity", "must be greater than 0"));
        }
        if self.query.page_size == Some(0) {
            return Err(invalid("query.page_size", "must be greater than 0"));
        }
        if self.storage.batch_size == Some(0) {
            return Err(invalid("storage.batch_size", "must be greater than 0"));
        }
        if self.storage.channel_capacity == Some(0) {
            return Err(invalid("storage.channel_capacity", "must be greater than 0"));
        }
        for pattern in &self.entry_points.controller_globs {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(ConfigError::InvalidValue {
                    field: "entry_points.controller_globs".to_string(),
                    message: format!("{pattern}: {e}"),
                });
            }
        }
        Ok(())
    }

    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(USER_CONFIG_DIR).join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored.
    fn merge_toml_file(config: &mut CalltraceConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: CalltraceConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `other` wins only where it has a value.
    fn merge(base: &mut CalltraceConfig, other: &CalltraceConfig) {
        // Extraction
        if other.extraction.threads.is_some() {
            base.extraction.threads = other.extraction.threads;
        }
        if other.extraction.max_syntax_errors.is_some() {
            base.extraction.max_syntax_errors = other.extraction.max_syntax_errors;
        }

        // Resolution
        if other.resolution.low_rate_threshold.is_some() {
            base.resolution.low_rate_threshold = other.resolution.low_rate_threshold;
        }
        if other.resolution.regression_tolerance.is_some() {
            base.resolution.regression_tolerance = other.resolution.regression_tolerance;
        }
        if other.resolution.fuzzy_blocklist.is_some() {
            base.resolution.fuzzy_blocklist = other.resolution.fuzzy_blocklist;
        }
        if !other.resolution.extra_blocklist.is_empty() {
            base.resolution.extra_blocklist = other.resolution.extra_blocklist.clone();
        }
        if !other.resolution.extra_di_markers.is_empty() {
            base.resolution.extra_di_markers = other.resolution.extra_di_markers.clone();
        }

        // Entry points
        if !other.entry_points.controller_globs.is_empty() {
            base.entry_points.controller_globs = other.entry_points.controller_globs.clone();
        }
        if !other.entry_points.extra_route_decorators.is_empty() {
            base.entry_points.extra_route_decorators =
                other.entry_points.extra_route_decorators.clone();
        }

        // Query
        if other.query.max_depth.is_some() {
            base.query.max_depth = other.query.max_depth;
        }
        if other.query.cache_capacity.is_some() {
            base.query.cache_capacity = other.query.cache_capacity;
        }
        if other.query.cache_ttl_seconds.is_some() {
            base.query.cache_ttl_seconds = other.query.cache_ttl_seconds;
        }
        if other.query.in_memory_threshold.is_some() {
            base.query.in_memory_threshold = other.query.in_memory_threshold;
        }
        if other.query.page_size.is_some() {
            base.query.page_size = other.query.page_size;
        }

        // Storage
        if other.storage.batch_size.is_some() {
            base.storage.batch_size = other.storage.batch_size;
        }
        if other.storage.channel_capacity.is_some() {
            base.storage.channel_capacity = other.storage.channel_capacity;
        }
        if other.storage.read_pool_size.is_some() {
            base.storage.read_pool_size = other.storage.read_pool_size;
        }
    }

    /// Apply environment variable overrides.
    /// Pattern: `CALLTRACE_THREADS`, `CALLTRACE_MAX_DEPTH`, etc.
    fn apply_env_overrides(config: &mut CalltraceConfig) {
        if let Some(v) = env_parse::<usize>("THREADS") {
            config.extraction.threads = Some(v);
        }
        if let Some(v) = env_parse::<f64>("LOW_RATE_THRESHOLD") {
            config.resolution.low_rate_threshold = Some(v);
        }
        if let Some(v) = env_parse::<f64>("REGRESSION_TOLERANCE") {
            config.resolution.regression_tolerance = Some(v);
        }
        if let Some(v) = env_parse::<bool>("FUZZY_BLOCKLIST") {
            config.resolution.fuzzy_blocklist = Some(v);
        }
        if let Some(v) = env_parse::<u32>("MAX_DEPTH") {
            config.query.max_depth = Some(v);
        }
        if let Some(v) = env_parse::<u64>("CACHE_TTL_SECONDS") {
            config.query.cache_ttl_seconds = Some(v);
        }
        if let Some(v) = env_parse::<usize>("IN_MEMORY_THRESHOLD") {
            config.query.in_memory_threshold = Some(v);
        }
        if let Some(v) = env_parse::<usize>("BATCH_SIZE") {
            config.storage.batch_size = Some(v);
        }
    }

    /// Apply CLI overrides (highest priority).
    fn apply_cli_overrides(config: &mut CalltraceConfig, cli: &CliOverrides) {
        if let Some(v) = cli.threads {
            config.extraction.threads = Some(v);
        }
        if let Some(v) = cli.max_depth {
            config.query.max_depth = Some(v);
        }
        if let Some(v) = cli.in_memory_threshold {
            config.query.in_memory_threshold = Some(v);
        }
        if let Some(v) = cli.cache_ttl_seconds {
            config.query.cache_ttl_seconds = Some(v);
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationFailed {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn env_parse<T: std::str::FromStr>(suffix: &str) -> Option<T> {
    std::env::var(format!("{ENV_PREFIX}{suffix}"))
        .ok()
        .and_then(|v| v.parse::<T>().ok())
}

/// Cross-platform home directory resolution.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
