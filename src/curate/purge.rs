//! Retention sweep: delete snapshots older than the horizon.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::window::{Direction, ScanMode, SelectError, TimeWindow, scan};
use crate::interrupt::CancelToken;
use crate::schema::{SnapshotCodec, SnapshotFile};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Files carrying the snapshot prefix.
    pub matched: usize,
    /// Prefixed files whose name did not parse; never deleted.
    pub unparsed: usize,
    /// Files older than the boundary.
    pub candidates: usize,
    /// Files actually removed.
    pub deleted: usize,
    /// Removals that failed.
    pub failed: usize,
    /// Nothing was removed.
    pub dry_run: bool,
    /// The sweep stopped early on cancellation.
    pub interrupted: bool,
}

impl PurgeReport {
    /// Files acted on: reported in a dry run, deleted otherwise.
    pub fn acted_on(&self) -> usize {
        if self.dry_run {
            self.candidates
        } else {
            self.deleted
        }
    }
}

impl std::fmt::Display for PurgeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} matched, {} unparsed, {} candidates, {} deleted, {} failed{}{}",
            self.matched,
            self.unparsed,
            self.candidates,
            self.deleted,
            self.failed,
            if self.dry_run { " (dry run)" } else { "" },
            if self.interrupted { " (interrupted)" } else { "" }
        )
    }
}

/// Walk `root` recursively and delete snapshots strictly older than
/// `now - horizon_hours`. Individual failures are logged and counted.
///
/// `cancel` is checked before every file; once set, the sweep stops and the
/// report is marked interrupted.
pub fn sweep(
    root: &Path,
    horizon_hours: u32,
    dry_run: bool,
    now: DateTime<Utc>,
    codec: &SnapshotCodec,
    cancel: &CancelToken,
) -> Result<PurgeReport, PurgeError> {
    let window = TimeWindow::new(now, horizon_hours);
    info!(
        "Scanning {} for snapshots older than {}",
        root.display(),
        window.boundary()
    );

    let selection = scan(root, ScanMode::Recursive, codec, |file| {
        let old = window.admits(file.timestamp, Direction::KeepIfBefore);
        if !old {
            debug!("Keep file: {}", file.path.display());
        }
        old
    })?;

    let mut report = PurgeReport {
        matched: selection.matched,
        unparsed: selection.unparsed,
        dry_run,
        ..Default::default()
    };
    purge_files(&selection.files, &mut report, cancel);
    info!("Purge of {}: {}", root.display(), report);
    Ok(report)
}

fn purge_files(files: &[SnapshotFile], report: &mut PurgeReport, cancel: &CancelToken) {
    for file in files {
        if cancel.is_cancelled() {
            warn!("Purge interrupted, {} files left", files.len() - report.candidates);
            report.interrupted = true;
            break;
        }
        report.candidates += 1;
        if report.dry_run {
            info!("File \"{}\" will be purged", file.path.display());
            continue;
        }
        match fs::remove_file(&file.path) {
            Ok(()) => {
                info!("Purge file \"{}\"", file.path.display());
                report.deleted += 1;
            }
            Err(err) => {
                warn!("Cannot delete \"{}\": {}", file.path.display(), err);
                report.failed += 1;
            }
        }
    }
}

/// Purge errors. Per-file failures are not errors, see [`PurgeReport`].
#[derive(Debug, thiserror::Error)]
pub enum PurgeError {
    #[error(transparent)]
    Select(#[from] SelectError),
}
