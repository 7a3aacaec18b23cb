//! Error taxonomy for the upload pipeline.
//!
//! Local errors (file type, template mismatch, preconditions) are handled
//! client-side and never reach the remote API. `Remote` carries the message
//! surfaced from a failed listings API call.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("only .csv files can be uploaded (got \"{0}\")")]
    InvalidFileType(String),

    #[error("uploaded file is missing required columns: {}", .0.join(", "))]
    TemplateMismatch(Vec<String>),

    #[error("no file selected")]
    NoFileSelected,

    #[error("nothing to commit, run a validation pass first")]
    NothingToCommit,

    #[error("another operation is already in flight for this session")]
    OperationInFlight,

    #[error("upload already committed, reset the session to start a new upload")]
    AlreadyCommitted,

    #[error("session not found")]
    SessionNotFound,

    #[error("{0}")]
    Remote(String),
}
