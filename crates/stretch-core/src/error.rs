//! Error taxonomy for the processing-request lifecycle.
//!
//! Every variant is terminal for the single request it belongs to and ends up
//! as one line in the status log; nothing here is meant to unwind the
//! interactive thread.

use std::path::PathBuf;

use thiserror::Error;

use crate::params::Control;
use crate::request::RequestId;

/// A `label:value` text could not be turned into an integer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("missing ':' delimiter in {0:?}")]
    MissingDelimiter(String),

    #[error("{value:?} is not an integer (in {text:?})")]
    InvalidInteger { text: String, value: String },
}

/// Request construction failed before anything was handed to the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Format error: {control}: {source}")]
    Format {
        control: Control,
        #[source]
        source: FormatError,
    },

    #[error("Invalid path: {role} path must be absolute and non-empty, got {path:?}")]
    Path { role: &'static str, path: PathBuf },
}

/// Why a process action did not result in a started or queued request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Busy: request {id} rejected, request {in_flight} is still processing")]
    Busy { id: RequestId, in_flight: RequestId },

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

/// Failure recorded in a [`crate::executor::ProcessingResult`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The engine returned a non-zero status.
    #[error("Failure: {message}")]
    Engine { status: i32, message: String },

    /// The worker could not produce an engine status at all (panic, spawn error)
    /// or the hand-off after a successful run failed.
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl Failure {
    /// Message without the log tag.
    pub fn message(&self) -> &str {
        match self {
            Failure::Engine { message, .. } => message,
            Failure::Unexpected(message) => message,
        }
    }
}
