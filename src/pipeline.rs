//! Per-zone animation driver.
//!
//! For every zone: select the snapshots inside the animation window,
//! hardlink them into a fresh workspace, run the encoder and publish the
//! video. The workspace is removed on every path out of
//! [`Animator::animate_zone`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{error, info, warn};

use crate::curate::{
    Direction, FrameNaming, MaterializeError, ScanMode, SelectError, TimeWindow, Workspace,
    WorkspaceError, materialize, select,
};
use crate::interrupt::CancelToken;
use crate::render::{ArtifactInvoker, Encoder, InvokeError, InvokeOutcome};
use crate::schema::{CurateConfig, Zone};

/// Result of animating one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneReport {
    pub zone: Zone,
    /// Frames handed to the encoder.
    pub frames: usize,
    pub outcome: InvokeOutcome,
}

impl ZoneReport {
    pub fn is_published(&self) -> bool {
        self.outcome.is_published()
    }
}

/// Result of a batch of zones.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Zones that ran to completion, published or not.
    pub completed: Vec<ZoneReport>,
    /// Zones that stopped on an error.
    pub errors: Vec<(Zone, PipelineError)>,
    /// The batch was cut short by an operator interrupt.
    pub interrupted: bool,
}

impl BatchReport {
    /// Zones without a published artifact.
    pub fn failures(&self) -> usize {
        self.errors.len() + self.completed.iter().filter(|r| !r.is_published()).count()
    }

    pub fn published(&self) -> usize {
        self.completed.iter().filter(|r| r.is_published()).count()
    }
}

/// Animates zones with one encoder and one configuration.
pub struct Animator<'a, E> {
    config: &'a CurateConfig,
    invoker: ArtifactInvoker<E>,
    naming: FrameNaming,
    cancel: CancelToken,
}

impl<'a, E: Encoder> Animator<'a, E> {
    pub fn new(config: &'a CurateConfig, encoder: E, cancel: CancelToken) -> Self {
        Self {
            config,
            invoker: ArtifactInvoker::new(encoder),
            naming: FrameNaming::from(&config.naming),
            cancel,
        }
    }

    /// Fail fast if the encoder is missing.
    pub fn ensure_available(&self) -> Result<(), PipelineError> {
        Ok(self.invoker.ensure_available()?)
    }

    /// Animate the last `animation_hours` of `zone` as seen at `now`.
    pub fn animate_zone(&self, zone: &Zone, now: DateTime<Utc>) -> Result<ZoneReport, PipelineError> {
        let source = zone.source_dir(&self.config.source_dir);
        if !source.is_dir() {
            return Err(PipelineError::MissingSource(source));
        }
        self.invoker.ensure_available()?;

        let window = TimeWindow::new(now, self.config.animation_hours);
        info!("Animating {} since {}", zone, window.boundary());
        let files = select(
            &source,
            &window,
            Direction::KeepIfAfter,
            ScanMode::Flat,
            &self.config.codec(),
        )?;

        let mut workspace = Workspace::create(&source, &self.config.workspace.dir_name())?;
        let frames = materialize(&files, workspace.path(), &self.naming)?;
        let output = zone.artifact_path(
            &self.config.video_dir,
            &self.config.naming.prefix,
            self.invoker.encoder().extension(),
        );
        let outcome = self
            .invoker
            .invoke(&workspace, frames.len(), &output, &self.cancel)?;
        workspace.destroy()?;

        Ok(ZoneReport {
            zone: zone.clone(),
            frames: frames.len(),
            outcome,
        })
    }

    /// Animate every zone in turn. A failing zone does not stop the batch;
    /// an interrupt does.
    pub fn run_batch(&self, zones: &[Zone], now: DateTime<Utc>) -> BatchReport {
        let mut report = BatchReport::default();
        for zone in zones {
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            match self.animate_zone(zone, now) {
                Ok(zone_report) => {
                    if let InvokeOutcome::Failed { reason } = &zone_report.outcome {
                        warn!("No animation for {}: {}", zone, reason);
                    }
                    report.completed.push(zone_report);
                }
                Err(err) if err.is_interrupt() => {
                    error!("{}: interrupted, stopping", zone);
                    report.errors.push((zone.clone(), err));
                    report.interrupted = true;
                    break;
                }
                Err(err) => {
                    error!("{}: {}", zone, err);
                    report.errors.push((zone.clone(), err));
                }
            }
        }
        info!(
            "{} of {} zones published, {} failed",
            report.published(),
            zones.len(),
            report.failures()
        );
        report
    }
}

/// Errors that stop one zone.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Source directory {0} does not exist")]
    MissingSource(PathBuf),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl PipelineError {
    /// Operator cancellation, which ends the whole run.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, PipelineError::Invoke(InvokeError::Interrupted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{EncodeJob, EncodeOutcome};
    use chrono::TimeZone;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    #[derive(Clone, Copy, PartialEq)]
    enum Behavior {
        /// Concatenate the frames, in index order, into the output.
        Concat,
        Fail,
        /// Cancel the token and report the interrupt, like a signalled wait.
        Interrupt,
    }

    struct FakeEncoder {
        behavior: Behavior,
        cancel: CancelToken,
    }

    impl Encoder for FakeEncoder {
        fn name(&self) -> &str {
            "fake"
        }

        fn extension(&self) -> &str {
            "mp4"
        }

        fn ensure_available(&self) -> Result<(), InvokeError> {
            Ok(())
        }

        fn encode(&self, job: &EncodeJob<'_>, _: &CancelToken) -> Result<EncodeOutcome, InvokeError> {
            match self.behavior {
                Behavior::Concat => {
                    let naming = FrameNaming::default();
                    let mut data = Vec::new();
                    for index in 0..job.frame_count {
                        data.extend(fs::read(job.frames_dir.join(naming.frame_name(index))).unwrap());
                    }
                    fs::write(job.output, data).unwrap();
                    Ok(EncodeOutcome::Success)
                }
                Behavior::Fail => Ok(EncodeOutcome::Failed {
                    status: Some(1),
                    reason: "exit status 1".to_string(),
                }),
                Behavior::Interrupt => {
                    self.cancel.cancel();
                    Err(InvokeError::Interrupted)
                }
            }
        }
    }

    struct Fixture {
        root: TempDir,
        config: CurateConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempdir().unwrap();
            let mut config = CurateConfig::default();
            config.source_dir = root.path().join("DXCC");
            config.video_dir = root.path().join("videos");
            config.animation_hours = 3;
            fs::create_dir_all(&config.video_dir).unwrap();
            Self { root, config }
        }

        /// Hourly snapshots of 2025-01-01 whose content is the hour.
        fn populate(&self, zone: &Zone) -> std::path::PathBuf {
            let dir = zone.source_dir(&self.config.source_dir);
            fs::create_dir_all(&dir).unwrap();
            for hour in 0..24 {
                let name = format!("dxcc-{}-20250101{:02}00.png", zone.name, hour);
                fs::write(dir.join(name), format!("{:02},", hour)).unwrap();
            }
            dir
        }

        fn animator(&self, behavior: Behavior) -> Animator<'_, FakeEncoder> {
            let cancel = CancelToken::new();
            let encoder = FakeEncoder {
                behavior,
                cancel: cancel.clone(),
            };
            Animator::new(&self.config, encoder, cancel)
        }

        fn video(&self, zone: &Zone) -> std::path::PathBuf {
            zone.artifact_path(&self.config.video_dir, "dxcc", "mp4")
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 23, 30, 0).unwrap()
    }

    fn subdirs(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().filter(|e| e.as_ref().unwrap().path().is_dir()).count()
    }

    #[test]
    fn test_animate_publishes_window_in_order() {
        let fixture = Fixture::new();
        let zone = Zone::continent("EU").unwrap();
        let source = fixture.populate(&zone);

        let report = fixture
            .animator(Behavior::Concat)
            .animate_zone(&zone, now())
            .unwrap();

        assert_eq!(report.frames, 3);
        assert!(report.is_published());
        assert_eq!(fs::read_to_string(fixture.video(&zone)).unwrap(), "21,22,23,");
        assert_eq!(subdirs(&source), 0);
    }

    #[test]
    fn test_encoder_failure_publishes_nothing() {
        let fixture = Fixture::new();
        let zone = Zone::cq(14);
        let source = fixture.populate(&zone);

        let report = fixture
            .animator(Behavior::Fail)
            .animate_zone(&zone, now())
            .unwrap();

        assert!(!report.is_published());
        assert!(!fixture.video(&zone).exists());
        assert_eq!(subdirs(&source), 0);
    }

    #[test]
    fn test_missing_source_dir() {
        let fixture = Fixture::new();
        let result = fixture
            .animator(Behavior::Concat)
            .animate_zone(&Zone::itu(7), now());
        assert!(matches!(result, Err(PipelineError::MissingSource(_))));
    }

    #[test]
    fn test_stale_workspace_fails_only_that_zone() {
        let fixture = Fixture::new();
        let stale = Zone::continent("AF").unwrap();
        let fresh = Zone::continent("EU").unwrap();
        let stale_dir = fixture.populate(&stale);
        fixture.populate(&fresh);
        fs::create_dir(stale_dir.join(fixture.config.workspace.dir_name())).unwrap();

        let report = fixture
            .animator(Behavior::Concat)
            .run_batch(&[stale.clone(), Zone::cq(3), fresh.clone()], now());

        assert!(!report.interrupted);
        assert_eq!(report.published(), 1);
        assert_eq!(report.failures(), 2);
        assert!(matches!(
            report.errors[0],
            (_, PipelineError::Workspace(WorkspaceError::AlreadyExists(_)))
        ));
        assert!(fixture.video(&fresh).exists());
        // The stale workspace belongs to an operator, not to this run.
        assert!(stale_dir.join(fixture.config.workspace.dir_name()).exists());
    }

    #[test]
    fn test_interrupt_stops_batch_and_cleans_up() {
        let fixture = Fixture::new();
        let first = Zone::continent("EU").unwrap();
        let second = Zone::continent("NA").unwrap();
        let source = fixture.populate(&first);
        fixture.populate(&second);

        let report = fixture
            .animator(Behavior::Interrupt)
            .run_batch(&[first.clone(), second.clone()], now());

        assert!(report.interrupted);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].1.is_interrupt());
        assert_eq!(subdirs(&source), 0);
        assert!(!fixture.video(&first).exists());
        assert!(!fixture.video(&second).exists());
        assert!(fixture.root.path().exists());
    }
}
