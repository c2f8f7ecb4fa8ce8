use thiserror::Error;

/// Failure taxonomy for the three pipeline stages.
///
/// Transport, HTTP-status and schema failures abort the affected stage and
/// leave previously produced output files untouched. Local failures (I/O,
/// image decode/encode, chart rendering) abort the process.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unexpected {context} payload: {detail}")]
    Schema { context: String, detail: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("chart rendering failed: {0}")]
    Render(String),
}

impl StageError {
    pub fn schema(context: &str, detail: impl Into<String>) -> Self {
        StageError::Schema {
            context: context.to_string(),
            detail: detail.into(),
        }
    }

    /// Exit-code contract: 0 success, 1 network/API failure, 2 local failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            StageError::ClientBuild(_)
            | StageError::Transport { .. }
            | StageError::HttpStatus { .. }
            | StageError::Schema { .. } => 1,
            StageError::Config(_)
            | StageError::Io(_)
            | StageError::Image(_)
            | StageError::Render(_) => 2,
        }
    }
}
