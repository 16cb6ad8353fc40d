//! Materialize an ordered snapshot list as a dense frame sequence.
//!
//! Frames are hardlinks named `<prefix>-<index>.<ext>`, the index zero-padded
//! to at least [`INDEX_WIDTH`] digits and counted from [`INDEX_ORIGIN`]. The
//! encoder addresses frames purely by position.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::schema::{NamingConfig, SnapshotFile};

/// Minimum number of digits in a frame index.
pub const INDEX_WIDTH: usize = 5;

/// Index of the first frame.
pub const INDEX_ORIGIN: usize = 0;

/// Naming scheme for frames inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNaming {
    prefix: String,
    extension: String,
}

impl FrameNaming {
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into(),
        }
    }

    /// File name of the frame at `index`.
    pub fn frame_name(&self, index: usize) -> String {
        format!(
            "{}-{:0width$}.{}",
            self.prefix,
            index,
            self.extension,
            width = INDEX_WIDTH
        )
    }

    /// printf-style pattern addressing every frame, e.g. `dxcc-%05d.png`.
    pub fn printf_pattern(&self) -> String {
        format!("{}-%0{}d.{}", self.prefix, INDEX_WIDTH, self.extension)
    }

    /// Glob pattern addressing every frame, e.g. `dxcc-*.png`.
    pub fn glob_pattern(&self) -> String {
        format!("{}-*.{}", self.prefix, self.extension)
    }
}

impl Default for FrameNaming {
    fn default() -> Self {
        Self::new("dxcc", "png")
    }
}

impl From<&NamingConfig> for FrameNaming {
    fn from(naming: &NamingConfig) -> Self {
        Self::new(&naming.prefix, &naming.extension)
    }
}

/// One frame of the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEntry {
    /// Position in the sequence.
    pub index: usize,
    /// Snapshot the frame links to.
    pub source: PathBuf,
    /// Link inside the workspace.
    pub link: PathBuf,
}

/// Hardlink `files` into the empty directory `workspace`, in order.
///
/// A source that disappeared before it could be linked (e.g. purged
/// concurrently) is skipped; indices stay contiguous.
pub fn materialize(
    files: &[SnapshotFile],
    workspace: &Path,
    naming: &FrameNaming,
) -> Result<Vec<SequenceEntry>, MaterializeError> {
    let mut listing = fs::read_dir(workspace).map_err(|source| MaterializeError::Workspace {
        path: workspace.to_path_buf(),
        source,
    })?;
    if listing.next().is_some() {
        return Err(MaterializeError::NotEmpty(workspace.to_path_buf()));
    }

    let entries = link_frames(files, workspace, naming, |from, to| fs::hard_link(from, to))?;
    info!(
        "{} frames linked into {}",
        entries.len(),
        workspace.display()
    );
    Ok(entries)
}

/// Link every file with `link_file`, numbering frames contiguously.
fn link_frames<L>(
    files: &[SnapshotFile],
    workspace: &Path,
    naming: &FrameNaming,
    mut link_file: L,
) -> Result<Vec<SequenceEntry>, MaterializeError>
where
    L: FnMut(&Path, &Path) -> io::Result<()>,
{
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let index = INDEX_ORIGIN + entries.len();
        let link = workspace.join(naming.frame_name(index));
        match link_file(&file.path, &link) {
            Ok(()) => {
                debug!("{} -> {}", link.display(), file.file_name);
                entries.push(SequenceEntry {
                    index,
                    source: file.path.clone(),
                    link,
                });
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound && !source_exists(&file.path) => {
                warn!("Snapshot {} vanished before linking, skipped", file.path.display());
            }
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                return Err(MaterializeError::CrossDevice {
                    snapshot: file.path.clone(),
                    workspace: workspace.to_path_buf(),
                });
            }
            Err(err) => {
                return Err(MaterializeError::Link {
                    source_path: file.path.clone(),
                    link,
                    source: err,
                });
            }
        }
    }
    Ok(entries)
}

fn source_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Materialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("Cannot list workspace {path}: {source}")]
    Workspace { path: PathBuf, source: io::Error },
    #[error("Workspace {0} is not empty")]
    NotEmpty(PathBuf),
    #[error("Cannot hardlink {snapshot} into {workspace}: different storage volumes")]
    CrossDevice { snapshot: PathBuf, workspace: PathBuf },
    #[error("Cannot link {source_path} as {link}: {source}")]
    Link {
        source_path: PathBuf,
        link: PathBuf,
        source: io::Error,
    },
}
