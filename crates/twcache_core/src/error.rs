use http::StatusCode;
use thiserror::Error;
use twcache_cache::CacheError;
use twcache_proxy::ForwardError;

/// Failure classes of the request pipeline, see [`PipelineError::class`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Auth,
    ClientInput,
    Gateway,
    Internal,
}

/// A hard failure that ends the pipeline and becomes the client response.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Missing twc_url parameter")]
    MissingTarget,

    #[error("Invalid twc_url parameter")]
    InvalidTarget,

    #[error("Invalid twc_cache_expiry parameter")]
    InvalidExpiry,

    #[error("Invalid twc_timeout parameter (must be between {min} and {max} seconds)")]
    InvalidTimeout { min: u64, max: u64 },

    #[error("Error reading request body: {0}")]
    ReadBody(String),

    #[error("Error reading cache: {0}")]
    CacheRead(#[from] CacheError),

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::Unauthorized => ErrorClass::Auth,
            PipelineError::MissingTarget
            | PipelineError::InvalidTarget
            | PipelineError::InvalidExpiry
            | PipelineError::InvalidTimeout { .. } => ErrorClass::ClientInput,
            PipelineError::Forward(ForwardError::Transport(_)) => ErrorClass::Gateway,
            PipelineError::ReadBody(_)
            | PipelineError::CacheRead(_)
            | PipelineError::Forward(_) => ErrorClass::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.class() {
            ErrorClass::Auth => StatusCode::UNAUTHORIZED,
            ErrorClass::ClientInput => StatusCode::BAD_REQUEST,
            ErrorClass::Gateway => StatusCode::BAD_GATEWAY,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
