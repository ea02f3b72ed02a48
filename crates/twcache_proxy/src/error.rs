use thiserror::Error;

/// Failure of a single forward, classified by where it happened.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The outbound request could not be assembled.
    #[error("Error creating request: {0}")]
    Build(#[source] reqwest::Error),

    /// Connect, TLS, send or deadline failure before a response arrived.
    #[error("Error forwarding request: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response started but its body could not be read in time.
    #[error("Error reading response: {0}")]
    Body(#[source] reqwest::Error),
}
