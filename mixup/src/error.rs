use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Request setup failed: missing group field, unknown decline function,
    /// bad parameters or an unusable multiplier.
    #[error("Config error: {0}")]
    Config(String),

    /// A decline function needs a field that was not declared or not resolved.
    #[error("Field resolution error: {0}")]
    FieldResolution(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::FieldResolution(_) => "field_resolution",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Io(_) => "io",
            Error::Yaml(_) => "yaml",
            Error::Json(_) => "json",
            Error::Toml(_) => "toml",
        }
    }

    /// Whether the failure was caused by the request itself (bad-request class).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
