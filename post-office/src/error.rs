use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SMTP protocol error: {0}")]
    SmtpProtocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid priority: {0}, must be one of: low, medium, high, now")]
    InvalidPriority(String),

    #[error("Email template not found: {name} (language: {language:?})")]
    TemplateNotFound { name: String, language: String },

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Cannot read attachment {path}: {source}")]
    AttachmentSource {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for MailError {
    fn from(err: config::ConfigError) -> Self {
        MailError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MailError>;
