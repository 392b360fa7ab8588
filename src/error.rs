use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("context mismatch: {0}")]
    ContextMismatch(String),

    #[error("feature dimension {dim} exceeds row size {row_size}")]
    DimensionOverflow { dim: usize, row_size: usize },

    #[error("noise budget exhausted: {remaining} bits remaining, {required} required")]
    NoiseBudgetExhausted { remaining: u32, required: u32 },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("ring degree must be a power of 2 and at least 16, got {0}")]
    InvalidRingDegree(usize),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("modulus mismatch")]
    ModulusMismatch,

    #[error("key not available: {0}")]
    MissingKey(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, MatchError>;
