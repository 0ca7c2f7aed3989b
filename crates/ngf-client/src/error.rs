//! Error types for the feedback client.

/// Errors returned by [`FeedbackClient`](crate::FeedbackClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to connect to or communicate with the NATS server.
    #[error("NATS error: {0}")]
    Nats(String),

    /// A request could not be encoded.
    #[error("serialization error: {source}")]
    Serde {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },
}
