use thiserror::Error;

/// Error kinds that can attach to a single URL or chunking attempt without
/// aborting the surrounding batch/site job (spec §7).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineErrorKind {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out")]
    Timeout,

    #[error("http status {code}")]
    HttpStatus { code: u16 },

    #[error("disallowed by robots.txt")]
    RobotsDisallowed,

    #[error("rate limited")]
    RateLimited,

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("no embedding service available")]
    EmbeddingUnavailable,

    #[error("failed to parse AI response as JSON: {0}")]
    AiParse(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Crate-boundary error type. Library code that talks to a single URL or
/// chunk should prefer carrying a [`PipelineErrorKind`] in the flowing value
/// (see `CrawlResult::error` / chunk metadata); this type is for operations
/// that fail synchronously before any flowing value exists (config load,
/// malformed top-level input, irrecoverable internal bugs).
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid URL {0}: {1}")]
    InvalidUrl(String, String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineErrorKind),
}

pub type Result<T> = std::result::Result<T, CommonError>;
