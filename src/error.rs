//! Error types for the latent-shift adapters

use thiserror::Error;

/// Main error type for adapter construction and synthesis
#[derive(Error, Debug)]
pub enum Error {
    /// Latent or shift shape disagrees with the adapter contract
    #[error("Shape mismatch: expected trailing shape {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Shape the adapter declares (without the batch dimension)
        expected: Vec<usize>,
        /// Full shape of the offending tensor
        actual: Vec<usize>,
    },

    /// Class identifier outside the generator's trained vocabulary
    #[error("Invalid class {class}: generator was trained on {num_classes} classes")]
    InvalidClass {
        /// Offending identifier
        class: u32,
        /// Size of the class vocabulary
        num_classes: usize,
    },

    /// Checkpoint unreadable or irreconcilable with the constructed network
    #[error("Checkpoint load error: {0}")]
    CheckpointLoad(String),

    /// Family/resolution combination without registered defaults
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Tensor operation error
    #[error("Tensor operation error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for latent-shift operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create a checkpoint load error
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::CheckpointLoad(msg.into())
    }

    /// Create an unsupported configuration error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
