use crate::error::{MailError, Result};
use crate::mail::Priority;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `POST_OFFICE__QUEUE__WORKERS=4`
const ENV_PREFIX: &str = "POST_OFFICE";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub smtp: SmtpConfig,
    pub queue: QueueConfig,
    pub templates: TemplatesConfig,
    pub defaults: DefaultsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding attachment blobs
    pub attachments_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Relay that accepts all outgoing mail (host:port)
    pub relay_addr: String,
    /// Name announced in EHLO, defaults to the local hostname
    pub hello_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of partitions processed in parallel
    pub workers: usize,
    /// Maximum number of emails selected per pass, unlimited when unset
    pub batch_size: Option<i64>,
    /// Delay before the next pass when the previous one sent something
    pub poll_interval_secs: u64,
    /// Delay before the next pass when the queue was empty
    pub idle_interval_secs: u64,
    /// Delay before the next pass after a store error
    pub error_backoff_secs: u64,
    /// Claims older than this are released at startup
    pub claim_timeout_secs: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub cache_enabled: bool,
    /// Directory of file templates used by the fallback send path
    pub template_dir: Option<String>,
    /// Directives prepended to template content before rendering
    pub preamble: String,
    /// Treat undefined variables as a rendering failure
    pub strict_undefined: bool,
    /// Bare tag -> styled tag replacements applied before rendering
    pub tag_styles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub priority: Priority,
    pub from_email: String,
    /// Blind copies added to templated mail when the caller gives none
    pub bcc: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MailError::Config(e.to_string()))?;

        toml::from_str(&content).map_err(|e| MailError::Config(e.to_string()))
    }

    /// Load defaults, then the optional TOML file, then `POST_OFFICE__*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("defaults.bcc")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl QueueConfig {
    pub fn partitions(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.workers).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://post-office.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            attachments_path: "/tmp/post-office/attachments".to_string(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:25".to_string(),
            hello_name: None,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            batch_size: None,
            poll_interval_secs: 5,
            idle_interval_secs: 30,
            error_backoff_secs: 60,
            claim_timeout_secs: 3600,
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            template_dir: None,
            preamble: crate::templates::renderer::DEFAULT_PREAMBLE.to_string(),
            strict_undefined: true,
            tag_styles: crate::templates::renderer::default_tag_styles(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            priority: Priority::Medium,
            from_email: "noreply@localhost".to_string(),
            bcc: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
