//! Runtime settings for the execution core

use crate::env_resolver::EnvResolver;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Supported file formats for configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    /// Detect file format from extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            Some("json") => Ok(FileFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::UnsupportedFormat("no extension".to_string())),
        }
    }

    pub fn parse(&self, content: &str) -> ConfigResult<JsonValue> {
        Ok(match self {
            FileFormat::Yaml => serde_yaml::from_str(content)?,
            FileFormat::Json => serde_json::from_str(content)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Deadline applied when neither the caller nor the action sets one
    pub default_timeout_ms: u64,
    /// Upper bound for any requested deadline
    pub max_timeout_ms: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self { default_timeout_ms: 10_000, max_timeout_ms: 300_000 }
    }
}

impl ExecutionSettings {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// How long a resolved context may be served without re-reading the stores
    pub ttl_secs: u64,
    /// Entry cap; expired entries are evicted first, then the oldest
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_secs: 30, max_entries: 1024 }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub max_attachment_bytes: u64,
    /// Limit for a single non-file field
    pub max_field_bytes: u64,
    /// Where attachments are spooled; the system temp dir when unset
    pub spool_dir: Option<PathBuf>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self { max_attachment_bytes: 10 * 1024 * 1024, max_field_bytes: 1024 * 1024, spool_dir: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub execution: ExecutionSettings,
    pub cache: CacheSettings,
    pub upload: UploadSettings,
    /// Environment used when the caller passes an empty environment id
    pub default_environment: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            execution: ExecutionSettings::default(),
            cache: CacheSettings::default(),
            upload: UploadSettings::default(),
            default_environment: "production".to_string(),
        }
    }
}

impl RuntimeSettings {
    /// Load settings from a `.yaml`, `.yml` or `.json` file
    pub fn load_from_file<P: AsRef<Path>>(path: P, resolver: &EnvResolver) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let settings = Self::parse_content(&content, FileFormat::from_path(path)?, resolver)?;
        tracing::debug!(path = %path.display(), "Loaded runtime settings");
        Ok(settings)
    }

    /// Parse settings, resolving `${VAR:default}` references first
    pub fn parse_content(
        content: &str,
        format: FileFormat,
        resolver: &EnvResolver,
    ) -> ConfigResult<Self> {
        let raw = if content.trim().is_empty() { JsonValue::Null } else { format.parse(content)? };
        let raw = if raw.is_null() { JsonValue::Object(Default::default()) } else { raw };
        let resolved = resolver.resolve(&raw)?;
        let settings: RuntimeSettings = serde_json::from_value(resolved)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.execution.default_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "execution.default_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.execution.default_timeout_ms > self.execution.max_timeout_ms {
            return Err(ConfigError::Validation(
                "execution.default_timeout_ms cannot exceed execution.max_timeout_ms".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Validation("cache.max_entries must be greater than 0".to_string()));
        }
        if self.default_environment.trim().is_empty() {
            return Err(ConfigError::Validation("default_environment cannot be empty".to_string()));
        }
        Ok(())
    }
}
