use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaFlowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Media Services API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unknown job output state '{0}'")]
    UnknownJobState(String),

    #[error("Job {job} ended in state {state}: {details}")]
    JobFailed {
        job: String,
        state: String,
        details: String,
    },

    #[error("Polling gave up after {0}")]
    PollTimeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Blob storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Cleanup failed: {}", .0.join("; "))]
    Cleanup(Vec<String>),
}

impl MediaFlowError {
    /// Whether the error is a not-found response from the remote service
    pub fn is_not_found(&self) -> bool {
        match self {
            MediaFlowError::NotFound(_) => true,
            MediaFlowError::Api { status, .. } => *status == 404,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaFlowError>;
