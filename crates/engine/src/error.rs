#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The pipeline ran but reported a failure.
    #[error("Conversion failed: {0}")]
    Failed(String),

    /// The pipeline claimed success but left no usable artifact behind.
    #[error("Engine produced no usable artifact")]
    MissingArtifact,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
