use thiserror::Error;

/// Type alias for Result with SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error types for the mailbox synchronization engine
#[derive(Error, Debug)]
pub enum SyncError {
    /// Authentication rejected by the mail server
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// The connection was closed by the server or the transport dropped
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Protocol-level error during a folder operation
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Index store request failed
    #[error("Index store error: {0}")]
    IndexStore(String),

    /// Classification service failed
    #[error("Classification error: {0}")]
    Classification(String),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Check if the error is transient and worth a reconnect attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_) | SyncError::ConnectionClosed(_) | SyncError::Io(_)
        )
    }

    /// Check if the error is permanent for the current connection
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Whether the error invalidates the connection it occurred on
    pub fn invalidates_connection(&self) -> bool {
        matches!(
            self,
            SyncError::Network(_)
                | SyncError::ConnectionClosed(_)
                | SyncError::Auth(_)
                | SyncError::Io(_)
        )
    }
}

impl From<async_imap::error::Error> for SyncError {
    fn from(error: async_imap::error::Error) -> Self {
        use async_imap::error::Error;
        match error {
            Error::ConnectionLost => {
                SyncError::ConnectionClosed("IMAP connection lost".to_string())
            }
            Error::Io(e) => SyncError::Network(e.to_string()),
            Error::No(msg) => SyncError::Protocol(format!("server said NO: {}", msg)),
            Error::Bad(msg) => SyncError::Protocol(format!("server said BAD: {}", msg)),
            other => SyncError::Protocol(other.to_string()),
        }
    }
}
