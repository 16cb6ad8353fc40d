//! Time-window selection of snapshot files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::schema::{SnapshotCodec, SnapshotFile};

/// A boundary computed once from a single "now" sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    now: DateTime<Utc>,
    boundary: DateTime<Utc>,
}

impl TimeWindow {
    /// Window covering the `horizon_hours` before `now`.
    ///
    /// A horizon reaching past the earliest representable instant clamps the
    /// boundary to that instant.
    pub fn new(now: DateTime<Utc>, horizon_hours: u32) -> Self {
        let boundary = now
            .checked_sub_signed(Duration::hours(i64::from(horizon_hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { now, boundary }
    }

    /// The sampled "now".
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// `now - horizon`.
    pub fn boundary(&self) -> DateTime<Utc> {
        self.boundary
    }

    /// Does `timestamp` fall on the kept side of the boundary?
    #[inline]
    pub fn admits(&self, timestamp: DateTime<Utc>, direction: Direction) -> bool {
        match direction {
            Direction::KeepIfAfter => timestamp > self.boundary,
            Direction::KeepIfBefore => timestamp < self.boundary,
        }
    }
}

/// Which side of the boundary to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Strictly newer than the boundary (animation input).
    KeepIfAfter,
    /// Strictly older than the boundary (purge candidates).
    KeepIfBefore,
}

/// Whether to descend into subdirectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Only the direct children of the root.
    Flat,
    /// The whole subtree.
    Recursive,
}

/// Result of a scan, with counters for reporting.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Selected files in chronological order.
    pub files: Vec<SnapshotFile>,
    /// Files carrying the snapshot prefix.
    pub matched: usize,
    /// Prefixed files whose name did not parse.
    pub unparsed: usize,
}

/// Select snapshots on one side of `window`, in chronological order.
///
/// An empty result is not an error.
pub fn select(
    root: &Path,
    window: &TimeWindow,
    direction: Direction,
    mode: ScanMode,
    codec: &SnapshotCodec,
) -> Result<Vec<SnapshotFile>, SelectError> {
    Ok(scan(root, mode, codec, |file| window.admits(file.timestamp, direction))?.files)
}

/// Walk `root`, parse every prefixed file name and keep those accepted by
/// `keep`. Unparseable names are logged and skipped.
///
/// Output is ordered by timestamp, then by file name.
pub fn scan<F>(
    root: &Path,
    mode: ScanMode,
    codec: &SnapshotCodec,
    mut keep: F,
) -> Result<Selection, SelectError>
where
    F: FnMut(&SnapshotFile) -> bool,
{
    if !root.is_dir() {
        return Err(SelectError::MissingRoot(root.to_path_buf()));
    }

    let walker = match mode {
        ScanMode::Flat => WalkDir::new(root).min_depth(1).max_depth(1),
        ScanMode::Recursive => WalkDir::new(root).min_depth(1),
    };

    let mut selection = Selection::default();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(SelectError::Walk {
                    path: root.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            if codec.has_prefix(&entry.file_name().to_string_lossy()) {
                warn!("File \"{}\" is not valid UTF-8", entry.path().display());
                selection.matched += 1;
                selection.unparsed += 1;
            }
            continue;
        };
        if !codec.has_prefix(name) {
            continue;
        }
        selection.matched += 1;

        let Some(parsed) = codec.parse(name) else {
            warn!("File \"{}\" matching error", entry.path().display());
            selection.unparsed += 1;
            continue;
        };

        let file = SnapshotFile::from_parsed(entry.path().to_path_buf(), name.to_string(), parsed);
        if keep(&file) {
            debug!("Selecting file {}", file.file_name);
            selection.files.push(file);
        }
    }

    selection
        .files
        .sort_by(|a, b| (a.timestamp, &a.file_name).cmp(&(b.timestamp, &b.file_name)));
    info!(
        "{} of {} files selected in {}",
        selection.files.len(),
        selection.matched,
        root.display()
    );
    Ok(selection)
}

/// Selection errors.
#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("Source directory {0} does not exist")]
    MissingRoot(PathBuf),
    #[error("Cannot read {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"png").unwrap();
    }

    fn hourly_day(dir: &Path) {
        for hour in 0..24 {
            touch(dir, &format!("dxcc-EU-20250101{:02}00.png", hour));
        }
        touch(dir, "dxcc-EU-202501020000.png");
    }

    fn sample_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 0, 30, 0).unwrap()
    }

    #[test]
    fn test_keep_if_after_selects_last_hour() {
        let dir = tempdir().unwrap();
        hourly_day(dir.path());
        let window = TimeWindow::new(sample_now(), 24);

        let files = select(
            dir.path(),
            &window,
            Direction::KeepIfAfter,
            ScanMode::Flat,
            &SnapshotCodec::default(),
        )
        .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "dxcc-EU-202501020000.png");
    }

    #[test]
    fn test_keep_if_before_selects_older_files() {
        let dir = tempdir().unwrap();
        hourly_day(dir.path());
        let window = TimeWindow::new(sample_now(), 24);

        let files = select(
            dir.path(),
            &window,
            Direction::KeepIfBefore,
            ScanMode::Flat,
            &SnapshotCodec::default(),
        )
        .unwrap();

        assert_eq!(files.len(), 24);
        assert!(files.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(files[0].file_name, "dxcc-EU-202501010000.png");
    }

    #[test]
    fn test_skips_unparseable_and_foreign_names() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "dxcc-EU-202501011200.png");
        touch(dir.path(), "dxcc-EU-garbage.png");
        touch(dir.path(), "canvas-light.png");
        fs::create_dir(dir.path().join("dxcc-EU-202501011300.png")).unwrap();

        let window = TimeWindow::new(sample_now(), 1000);
        let selection = scan(dir.path(), ScanMode::Flat, &SnapshotCodec::default(), |f| {
            window.admits(f.timestamp, Direction::KeepIfAfter)
        })
        .unwrap();

        assert_eq!(selection.files.len(), 1);
        assert_eq!(selection.matched, 2);
        assert_eq!(selection.unparsed, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_count_as_unparsed() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        touch(dir.path(), "dxcc-EU-202501011200.png");
        let raw = OsStr::from_bytes(b"dxcc-EU-2025\xff01011300.png");
        if fs::write(dir.path().join(raw), b"png").is_err() {
            // Filesystem refuses non-UTF-8 names.
            return;
        }
        fs::write(dir.path().join(OsStr::from_bytes(b"other-\xff.png")), b"png").unwrap();

        let selection = scan(dir.path(), ScanMode::Flat, &SnapshotCodec::default(), |_| true).unwrap();

        assert_eq!(selection.files.len(), 1);
        assert_eq!(selection.matched, 2);
        assert_eq!(selection.unparsed, 1);
    }

    #[test]
    fn test_huge_horizon_clamps_boundary() {
        let window = TimeWindow::new(sample_now(), u32::MAX);
        assert_eq!(window.boundary(), DateTime::<Utc>::MIN_UTC);
        assert!(window.admits(sample_now(), Direction::KeepIfAfter));
        assert!(!window.admits(sample_now(), Direction::KeepIfBefore));
    }

    #[test]
    fn test_flat_and_recursive_modes() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("continent").join("EU");
        fs::create_dir_all(&nested).unwrap();
        touch(dir.path(), "dxcc-AF-202501011200.png");
        touch(&nested, "dxcc-EU-202501011100.png");

        let window = TimeWindow::new(sample_now(), 1000);
        let codec = SnapshotCodec::default();
        let flat = select(dir.path(), &window, Direction::KeepIfAfter, ScanMode::Flat, &codec)
            .unwrap();
        let deep = select(
            dir.path(),
            &window,
            Direction::KeepIfAfter,
            ScanMode::Recursive,
            &codec,
        )
        .unwrap();

        assert_eq!(flat.len(), 1);
        assert_eq!(deep.len(), 2);
        assert_eq!(deep[0].tag, "EU");
    }

    #[test]
    fn test_mixed_formats_sorted_chronologically() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "dxcc-EU-20250101T110000.png");
        touch(dir.path(), "dxcc-EU-202501011030.png");
        touch(dir.path(), "dxcc-EU-20250101T100000.png");

        let window = TimeWindow::new(sample_now(), 1000);
        let files = select(
            dir.path(),
            &window,
            Direction::KeepIfAfter,
            ScanMode::Flat,
            &SnapshotCodec::default(),
        )
        .unwrap();

        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "dxcc-EU-20250101T100000.png",
                "dxcc-EU-202501011030.png",
                "dxcc-EU-20250101T110000.png",
            ]
        );
    }

    #[test]
    fn test_empty_and_missing_roots() {
        let dir = tempdir().unwrap();
        let window = TimeWindow::new(sample_now(), 24);
        let codec = SnapshotCodec::default();

        let files =
            select(dir.path(), &window, Direction::KeepIfAfter, ScanMode::Flat, &codec).unwrap();
        assert!(files.is_empty());

        let missing = dir.path().join("nope");
        assert!(matches!(
            select(&missing, &window, Direction::KeepIfAfter, ScanMode::Flat, &codec),
            Err(SelectError::MissingRoot(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_directions_partition_parsed_files(
            offsets in proptest::collection::btree_set(0i64..2000, 0..40),
            horizon in 1u32..40,
        ) {
            let dir = tempdir().unwrap();
            let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
            for minutes in &offsets {
                let ts = base + Duration::minutes(*minutes);
                touch(dir.path(), &format!("dxcc-EU-{}.png", ts.format("%Y%m%d%H%M")));
            }
            // Seconds offset keeps the boundary off every minute-precision stamp.
            let now = base + Duration::hours(30) + Duration::seconds(30);
            let window = TimeWindow::new(now, horizon);
            let codec = SnapshotCodec::default();

            let after = select(dir.path(), &window, Direction::KeepIfAfter, ScanMode::Flat, &codec).unwrap();
            let before = select(dir.path(), &window, Direction::KeepIfBefore, ScanMode::Flat, &codec).unwrap();

            prop_assert_eq!(after.len() + before.len(), offsets.len());
            prop_assert!(after.iter().all(|f| f.timestamp > window.boundary()));
            prop_assert!(before.iter().all(|f| f.timestamp < window.boundary()));
            prop_assert!(after.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        }
    }
}
