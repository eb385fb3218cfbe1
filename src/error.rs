use std::error::Error;
use std::fmt;

/// Error type for configuration and boundary validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CbrnnError {
    /// The hidden size cannot be split into excitatory/inhibitory halves
    InvalidPartition(String),
    /// Invalid component configuration
    InvalidConfig(String),
    /// Tensor shape mismatch at a component boundary
    ShapeMismatch(String),
    /// A named tensor expected in a bundle is missing
    MissingTensor(String),
}

impl fmt::Display for CbrnnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CbrnnError::InvalidPartition(msg) => write!(f, "Invalid partition: {}", msg),
            CbrnnError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            CbrnnError::ShapeMismatch(msg) => write!(f, "Shape mismatch: {}", msg),
            CbrnnError::MissingTensor(name) => write!(f, "Missing tensor: {}", name),
        }
    }
}

impl Error for CbrnnError {}

pub type CbrnnResult<T> = Result<T, CbrnnError>;
