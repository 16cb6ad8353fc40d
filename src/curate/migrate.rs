//! Upgrade compact-format snapshot names to the delimited form.

use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};

use super::window::{ScanMode, SelectError, scan};
use crate::interrupt::CancelToken;
use crate::schema::{FormatKind, SnapshotCodec};

/// Outcome of one migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Files renamed to the delimited form.
    pub renamed: usize,
    /// Files left alone because the target name already exists.
    pub skipped: usize,
    /// Renames that failed for another reason.
    pub failed: usize,
    /// The pass stopped early on cancellation.
    pub interrupted: bool,
}

/// Rename every compact-format snapshot directly under `dir`.
///
/// An existing target is never overwritten: the new name is created with a
/// hardlink, which fails if the name is taken, and the old name is removed
/// afterwards. `cancel` is checked before every file.
pub fn migrate_legacy(
    dir: &Path,
    codec: &SnapshotCodec,
    cancel: &CancelToken,
) -> Result<MigrationReport, MigrateError> {
    let legacy = scan(dir, ScanMode::Flat, codec, |file| {
        file.format == FormatKind::Compact
    })?;

    let mut report = MigrationReport::default();
    for file in legacy.files {
        if cancel.is_cancelled() {
            warn!("Rename of {} interrupted", dir.display());
            report.interrupted = true;
            break;
        }
        let target = dir.join(codec.render(&file.tag, file.timestamp, file.style));
        match fs::hard_link(&file.path, &target) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                warn!("{} exists, {} not renamed", target.display(), file.file_name);
                report.skipped += 1;
                continue;
            }
            Err(err) => {
                warn!("Cannot rename {}: {}", file.path.display(), err);
                report.failed += 1;
                continue;
            }
        }
        if let Err(err) = fs::remove_file(&file.path) {
            warn!(
                "{} linked as {} but old name not removed: {}",
                file.path.display(),
                target.display(),
                err
            );
            report.failed += 1;
            continue;
        }
        info!("{} -> {}", file.path.display(), target.display());
        report.renamed += 1;
    }
    Ok(report)
}

/// Migration errors.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error(transparent)]
    Select(#[from] SelectError),
}
