//! Narrow interface to an external artifact producer.

use std::io;
use std::path::{Path, PathBuf};

use crate::interrupt::CancelToken;

/// One encoding request.
#[derive(Debug, Clone, Copy)]
pub struct EncodeJob<'a> {
    /// Directory holding the frame sequence.
    pub frames_dir: &'a Path,
    /// Number of frames in the sequence.
    pub frame_count: usize,
    /// Where the encoder writes its output.
    pub output: &'a Path,
}

/// Result of a finished encoder run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeOutcome {
    /// The encoder exited cleanly.
    Success,
    /// The encoder ran but did not succeed.
    Failed {
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Human-readable cause.
        reason: String,
    },
}

/// An external tool that turns a frame sequence into one artifact.
///
/// Implementations must honor `cancel` while blocked, returning
/// [`InvokeError::Interrupted`].
pub trait Encoder {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Extension of the produced artifact, without the dot.
    fn extension(&self) -> &str;

    /// Fail fast if the tool cannot be run at all.
    fn ensure_available(&self) -> Result<(), InvokeError>;

    /// Run the tool to completion.
    fn encode(&self, job: &EncodeJob<'_>, cancel: &CancelToken)
    -> Result<EncodeOutcome, InvokeError>;
}

impl<E: Encoder + ?Sized> Encoder for &E {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn extension(&self) -> &str {
        (**self).extension()
    }

    fn ensure_available(&self) -> Result<(), InvokeError> {
        (**self).ensure_available()
    }

    fn encode(
        &self,
        job: &EncodeJob<'_>,
        cancel: &CancelToken,
    ) -> Result<EncodeOutcome, InvokeError> {
        (**self).encode(job, cancel)
    }
}

/// Errors that stop an invocation outright.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("{0} not found")]
    ToolNotFound(String),
    #[error("Cannot open encoder log {path}: {source}")]
    Log { path: PathBuf, source: io::Error },
    #[error("Cannot start {tool}: {source}")]
    Spawn { tool: String, source: io::Error },
    #[error("Lost track of {tool}: {source}")]
    Wait { tool: String, source: io::Error },
    #[error("Interrupted")]
    Interrupted,
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Failure to move a finished artifact into place.
#[derive(Debug, thiserror::Error)]
#[error("Cannot publish {from} as {to}: {source}")]
pub struct PublishError {
    pub from: PathBuf,
    pub to: PathBuf,
    pub source: io::Error,
}
