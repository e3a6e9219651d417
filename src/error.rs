use thiserror::Error;

/// Domain failures raised inside the pipeline.
///
/// These travel inside `anyhow::Error`; use `downcast_ref::<PipelineError>()`
/// to tell them apart from transport or I/O failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Not enough data after preparation. Got {rows} samples, need at least {required}.")]
    InsufficientData { rows: usize, required: usize },

    #[error("No trained model available. Please train the model first.")]
    ModelNotTrained,

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Frame has no rows")]
    EmptyFrame,

    #[error("Model artifact error: {0}")]
    Artifact(String),
}
