/// Central error type for the Pantry client.
#[derive(Debug, thiserror::Error)]
pub enum PantryError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("item not found: {key}")]
    ItemNotFound { key: String },

    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("credential error: {message}")]
    CredentialError { message: String },

    #[error("{0}")]
    Other(String),
}

impl PantryError {
    /// Transport-level failure with no HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        PantryError::ApiError {
            status: 0,
            message: message.into(),
        }
    }

    /// Whether this error came from the remote API (network or server).
    pub fn is_remote(&self) -> bool {
        matches!(self, PantryError::ApiError { .. })
    }
}
