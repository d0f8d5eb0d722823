use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON document: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to encode or decode QoS message: {0}")]
    EncodingError(#[from] bincode::Error),

    /// Fatal during job deployment, e.g. more than one constraint on a single QoS graph.
    #[error("Invalid QoS configuration: {0}")]
    ConfigurationError(String),

    /// Raised by constructors of roles, actions and reporter ids.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to build QoS graph: {0}")]
    ModelError(String),

    #[error("Unknown element in QoS graph: {0}")]
    UnknownGraphElement(String),

    #[error("Gate operation failed: {0}")]
    GateError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
