use thiserror::Error;

/// Errors raised while resolving upstream streams into playable sources
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("invalid proxy base URL: {0}")]
    InvalidBase(#[from] url::ParseError),

    #[error("upstream URL rejected: {0}")]
    InvalidUpstream(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;
