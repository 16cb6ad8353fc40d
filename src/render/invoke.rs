//! Run an encoder over a materialized workspace and publish the result.
//!
//! The artifact is first written inside the workspace and only moved to its
//! final name once the encoder reports success, so a reader of the output
//! directory never sees a partial file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use log::{error, info, warn};

use super::encoder::{EncodeJob, EncodeOutcome, Encoder, InvokeError, PublishError};
use crate::curate::Workspace;
use crate::interrupt::CancelToken;

/// What became of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeOutcome {
    /// The artifact is in place.
    Published { path: PathBuf, bytes: u64 },
    /// Nothing was published; the previous artifact, if any, is untouched.
    Failed { reason: String },
}

impl InvokeOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, InvokeOutcome::Published { .. })
    }
}

/// Drives an [`Encoder`] and publishes its output atomically.
#[derive(Debug, Clone)]
pub struct ArtifactInvoker<E> {
    encoder: E,
}

impl<E: Encoder> ArtifactInvoker<E> {
    pub fn new(encoder: E) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Fail fast if the encoder cannot run.
    pub fn ensure_available(&self) -> Result<(), InvokeError> {
        self.encoder.ensure_available()
    }

    /// Encode the `frame_count` frames in `workspace` into `output`.
    ///
    /// A failed or empty encode is an [`InvokeOutcome::Failed`], not an
    /// error; errors are reserved for conditions that should stop the run.
    pub fn invoke(
        &self,
        workspace: &Workspace,
        frame_count: usize,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<InvokeOutcome, InvokeError> {
        self.encoder.ensure_available()?;
        if frame_count == 0 {
            warn!("No frames for {}, encoder not started", output.display());
            return Ok(InvokeOutcome::Failed {
                reason: "no frames".to_string(),
            });
        }

        let staged = workspace.join(format!(
            "video-{}.{}",
            process::id(),
            self.encoder.extension()
        ));
        let job = EncodeJob {
            frames_dir: workspace.path(),
            frame_count,
            output: &staged,
        };

        match self.encoder.encode(&job, cancel)? {
            EncodeOutcome::Success => {}
            EncodeOutcome::Failed { reason, .. } => {
                return Ok(InvokeOutcome::Failed { reason });
            }
        }

        let bytes = match fs::metadata(&staged) {
            Ok(meta) if meta.len() > 0 => meta.len(),
            Ok(_) => {
                error!("{} produced an empty file", self.encoder.name());
                return Ok(InvokeOutcome::Failed {
                    reason: "empty artifact".to_string(),
                });
            }
            Err(err) => {
                error!("{} produced no file: {}", self.encoder.name(), err);
                return Ok(InvokeOutcome::Failed {
                    reason: "missing artifact".to_string(),
                });
            }
        };

        publish_atomic(&staged, output)?;
        info!("Animation {} generated ({} bytes)", output.display(), bytes);
        Ok(InvokeOutcome::Published {
            path: output.to_path_buf(),
            bytes,
        })
    }
}

/// Move `staged` to `target`, replacing it in one step.
///
/// When the two live on different filesystems the file is first copied
/// next to `target` under a hidden name, then renamed over it.
pub fn publish_atomic(staged: &Path, target: &Path) -> Result<(), PublishError> {
    publish_with(staged, target, |from, to| fs::rename(from, to))
}

fn publish_with<R>(staged: &Path, target: &Path, mut rename: R) -> Result<(), PublishError>
where
    R: FnMut(&Path, &Path) -> io::Result<()>,
{
    let publish_error = |source| PublishError {
        from: staged.to_path_buf(),
        to: target.to_path_buf(),
        source,
    };
    match rename(staged, target) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            let sibling = hidden_sibling(target);
            let copied = fs::copy(staged, &sibling).and_then(|_| rename(&sibling, target));
            if let Err(err) = copied {
                let _ = fs::remove_file(&sibling);
                return Err(publish_error(err));
            }
            let _ = fs::remove_file(staged);
            Ok(())
        }
        Err(err) => Err(publish_error(err)),
    }
}

fn hidden_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.tmp", name, process::id()))
}
