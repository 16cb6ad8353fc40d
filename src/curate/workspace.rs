//! Exclusively owned scratch directory.
//!
//! A [`Workspace`] is created fresh for one operation and removed when the
//! guard is dropped, whichever way the operation ends. An explicit
//! [`Workspace::destroy`] disarms the drop; calling it again is a no-op.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{error, info};

/// Scratch directory guard.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Create `<root>/<name>`. Fails if it already exists, which means a
    /// previous run did not clean up and needs an operator.
    pub fn create(root: &Path, name: &str) -> Result<Self, WorkspaceError> {
        let path = root.join(name);
        match fs::create_dir(&path) {
            Ok(()) => {
                info!("Work directory {} created", path.display());
                Ok(Self {
                    path,
                    removed: false,
                })
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(WorkspaceError::AlreadyExists(path))
            }
            Err(source) => Err(WorkspaceError::Create { path, source }),
        }
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of an entry inside the workspace.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Has the directory been removed already?
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Remove every entry, then the directory. Idempotent.
    pub fn destroy(&mut self) -> Result<(), WorkspaceError> {
        if self.removed {
            return Ok(());
        }
        remove_tree(&self.path).map_err(|source| WorkspaceError::Remove {
            path: self.path.clone(),
            source,
        })?;
        self.removed = true;
        info!("Working directory \"{}\" removed", self.path.display());
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            error!("{}", err);
        }
    }
}

fn remove_tree(dir: &Path) -> io::Result<()> {
    let listing = match fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    for entry in listing {
        let entry = entry?;
        let result = if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())
        } else {
            fs::remove_file(entry.path())
        };
        match result {
            Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
            _ => {}
        }
    }
    match fs::remove_dir(dir) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Workspace lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Workspace {0} already exists, a previous run may have crashed")]
    AlreadyExists(PathBuf),
    #[error("Cannot create workspace {path}: {source}")]
    Create { path: PathBuf, source: io::Error },
    #[error("Cannot remove workspace {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
}
