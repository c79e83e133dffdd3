use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid prefix `{0}`")]
    InvalidPrefix(String),
    #[error("unknown router `{0}`")]
    UnknownRouter(String),
    #[error("malformed network configuration: {0}")]
    Config(#[from] serde_json::Error),
}
