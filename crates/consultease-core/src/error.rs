use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Card errors
    #[error("Invalid card identifier: {0}")]
    InvalidCardIdentifier(String),

    // Configuration errors
    #[error("Invalid value for {key}: {message}")]
    InvalidConfigValue { key: String, message: String },

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
