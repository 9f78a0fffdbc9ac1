use thiserror::Error;

/// Errors that can occur while turning masks into segment sequences.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ShapeError {
    #[error("failed to load image: {0}")]
    ImageLoad(String),

    #[error("mask has no foreground pixels")]
    DegenerateMask,

    #[error("fitted {count} segments, but tables hold at most {max}")]
    SequenceOverflow { count: usize, max: usize },

    #[error("invalid segment table: {0}")]
    InvalidTable(String),

    #[error("inconsistent batch shape: {0}")]
    BatchShape(String),

    #[error("predictor failed: {0}")]
    Predictor(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
