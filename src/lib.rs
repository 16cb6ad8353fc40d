//! animdxcc - Curate propagation snapshots into animations and overviews.
//!
//! An upstream feed drops timestamped images named
//! `dxcc-<tag>-<timestamp>[-<style>].png` into one directory per zone. This
//! crate selects the snapshots inside a time window, hardlinks them as a
//! dense frame sequence into a scratch workspace, and hands the workspace to
//! an external encoder. The same selection logic drives the retention sweep.
//!
//! # Architecture
//!
//! - `schema`: Configuration, filename codec and snapshot/zone types
//! - `curate`: Window selection, materialization, workspace, purge, rename
//! - `render`: Encoder interface, ffmpeg, atomic publishing, overview canvas
//! - `pipeline`: Per-zone animation driver
//! - `interrupt`: Operator cancellation
//!
//! # Example
//!
//! ```rust,no_run
//! use animdxcc::{
//!     curate::FrameNaming,
//!     interrupt::CancelToken,
//!     pipeline::Animator,
//!     render::FfmpegEncoder,
//!     schema::{CurateConfig, Zone},
//! };
//!
//! let config = CurateConfig::default();
//! let encoder = FfmpegEncoder::new(config.encoder.clone(), FrameNaming::from(&config.naming));
//! let animator = Animator::new(&config, encoder, CancelToken::with_signals());
//!
//! let zones = [Zone::continent("EU").unwrap(), Zone::cq(14)];
//! let report = animator.run_batch(&zones, chrono::Utc::now());
//! println!("{} published, {} failed", report.published(), report.failures());
//! ```

pub mod curate;
pub mod interrupt;
pub mod pipeline;
pub mod render;
pub mod schema;

// Re-export commonly used types
pub use curate::{TimeWindow, Workspace, materialize, select, sweep};
pub use pipeline::{Animator, BatchReport};
pub use schema::{CurateConfig, SnapshotCodec, SnapshotFile, Zone};
