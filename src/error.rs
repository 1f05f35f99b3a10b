use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DataPilotError {
    #[error("Please upload a CSV file")]
    UnsupportedFileType(String),

    #[error("no file selected")]
    EmptyFileName,

    #[error("{message}")]
    UploadFailed { status: Option<u16>, message: String },

    #[error("{message}")]
    FetchFailed { status: Option<u16>, message: String },

    #[error("{message}")]
    QaFailed { status: Option<u16>, message: String },

    #[error("question is empty")]
    EmptyQuestion,

    #[error("a question is already being answered")]
    QuestionPending,

    #[error("no question is awaiting an answer")]
    NoPendingQuestion,

    #[error("missing API base URL (set DATAPILOT_API_BASE_URL or pass --api-base)")]
    MissingBaseUrl,

    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

/// Coarse classification used by the presentation layer and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally, never reached the network.
    Validation,
    /// Non-success response or network failure.
    Transport,
    /// Illegal session transition, ignored by the default flows.
    State,
    Config,
}

impl DataPilotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataPilotError::UnsupportedFileType(_) | DataPilotError::EmptyFileName => {
                ErrorKind::Validation
            }
            DataPilotError::UploadFailed { .. }
            | DataPilotError::FetchFailed { .. }
            | DataPilotError::QaFailed { .. } => ErrorKind::Transport,
            DataPilotError::EmptyQuestion
            | DataPilotError::QuestionPending
            | DataPilotError::NoPendingQuestion => ErrorKind::State,
            DataPilotError::MissingBaseUrl
            | DataPilotError::InvalidBaseUrl(_)
            | DataPilotError::HttpClient(_)
            | DataPilotError::ConfigRead(_)
            | DataPilotError::ConfigParse(_)
            | DataPilotError::Filesystem(_) => ErrorKind::Config,
        }
    }

    /// HTTP status of a transport failure, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            DataPilotError::UploadFailed { status, .. }
            | DataPilotError::FetchFailed { status, .. }
            | DataPilotError::QaFailed { status, .. } => *status,
            _ => None,
        }
    }
}
