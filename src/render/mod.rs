//! Render module - Turning a materialized workspace into a published artifact.
//!
//! - `encoder`: the narrow interface to an external producer
//! - `ffmpeg`: the video encoder
//! - `invoke`: staging and atomic publication
//! - `mosaic`: the daily overview canvas
//! - `caption`: bitmap text used on the canvas

mod caption;
mod encoder;
mod ffmpeg;
mod invoke;
mod mosaic;

pub use caption::*;
pub use encoder::*;
pub use ffmpeg::*;
pub use invoke::*;
pub use mosaic::*;
