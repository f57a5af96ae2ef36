use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A cache, store, or chain client could not be built.
    #[error("failed to construct {component}: {reason}")]
    Construction {
        component: &'static str,
        reason: String,
    },

    /// The collection filter could not be populated before indexing.
    #[error("failed on preload collection to filter: {0}")]
    Preload(String),

    #[error("service already started")]
    AlreadyStarted,

    #[error("shutdown timed out with {outstanding} background loop(s) still running")]
    ShutdownTimedOut { outstanding: usize },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("chain error: {0}")]
    Chain(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a [`Error::Construction`] failure.
    pub fn construction(component: &'static str, reason: impl ToString) -> Self {
        Self::Construction {
            component,
            reason: reason.to_string(),
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Cache(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_error_names_component() {
        let err = Error::construction("relational store", "unable to open database file");
        assert_eq!(
            err.to_string(),
            "failed to construct relational store: unable to open database file"
        );
    }

    #[test]
    fn config_error_converts_into_error() {
        let err: Error = ConfigError::MissingField { field: "chain_cfg.name" }.into();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField {
                field: "chain_cfg.name"
            })
        ));
    }

    #[test]
    fn preload_error_keeps_context() {
        let err = Error::Preload("database error: no such table: collections".into());
        assert!(err.to_string().starts_with("failed on preload collection to filter"));
    }
}
