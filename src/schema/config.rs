//! Configuration types for snapshot curation.
//!
//! A [`CurateConfig`] is resolved once at the process boundary (defaults,
//! then an optional JSON file, then command line overrides) and passed by
//! reference to every component.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::SnapshotCodec;

/// Longest accepted animation or retention horizon, ten years.
pub const MAX_HORIZON_HOURS: u32 = 10 * 366 * 24;

/// Largest overview canvas, in pixels.
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurateConfig {
    /// Root of the snapshot tree (`<source>/<kind>/<zone>/...`).
    pub source_dir: PathBuf,
    /// Directory where animations are published.
    pub video_dir: PathBuf,
    /// Animation window in hours.
    pub animation_hours: u32,
    /// Retention window in hours.
    pub retention_hours: u32,
    /// Snapshot naming convention.
    pub naming: NamingConfig,
    /// Scratch directory naming.
    pub workspace: WorkspaceConfig,
    /// External video encoder.
    pub encoder: EncoderConfig,
    /// Overview canvas layout.
    pub mosaic: MosaicConfig,
}

impl Default for CurateConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("/var/tmp/DXCC"),
            video_dir: PathBuf::from("/tmp"),
            animation_hours: 120,
            retention_hours: 7 * 24,
            naming: NamingConfig::default(),
            workspace: WorkspaceConfig::default(),
            encoder: EncoderConfig::default(),
            mosaic: MosaicConfig::default(),
        }
    }
}

/// Snapshot filename convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Leading token of every snapshot and frame name.
    pub prefix: String,
    /// Image extension, without the dot.
    pub extension: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: "dxcc".to_string(),
            extension: "png".to_string(),
        }
    }
}

impl NamingConfig {
    /// Codec for this naming convention.
    pub fn codec(&self) -> SnapshotCodec {
        SnapshotCodec::new(&self.prefix, &self.extension)
    }
}

/// Scratch directory naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Base name of the scratch directory.
    pub name: String,
    /// Append the process id so concurrent runs never share a workspace.
    pub process_scoped: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            name: "workdir".to_string(),
            process_scoped: true,
        }
    }
}

impl WorkspaceConfig {
    /// Directory name for the current process.
    pub fn dir_name(&self) -> String {
        if self.process_scoped {
            format!("{}-{}", self.name, std::process::id())
        } else {
            self.name.clone()
        }
    }
}

/// How the encoder addresses the frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePattern {
    /// `dxcc-%05d.png`, counted from the first index.
    #[default]
    Printf,
    /// `dxcc-*.png`, expanded and sorted by the encoder.
    Glob,
}

/// External video encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Executable name (looked up on `PATH`) or path.
    pub binary: String,
    /// Input frames per second.
    pub frame_rate: u32,
    /// Frame addressing scheme.
    pub frame_pattern: FramePattern,
    /// Output video codec.
    pub codec: String,
    /// Output pixel format.
    pub pixel_format: String,
    /// Output scale filter argument (`W:H`).
    pub scale: String,
    /// Output container extension.
    pub container: String,
    /// Encoder stdout/stderr are appended here.
    pub log_file: PathBuf,
    /// Kill the encoder after this many seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            frame_rate: 10,
            frame_pattern: FramePattern::Printf,
            codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            scale: "800:600".to_string(),
            container: "mp4".to_string(),
            log_file: PathBuf::from("/tmp/newanim.log"),
            timeout_secs: None,
        }
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Size {
    type Err = ConfigError;

    /// Parse `WIDTHxHEIGHT`, e.g. `360x240`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidSize(s.to_string());
        let lower = s.to_ascii_lowercase();
        let (w, h) = lower.split_once('x').ok_or_else(invalid)?;
        let width = w.parse().map_err(|_| invalid())?;
        let height = h.parse().map_err(|_| invalid())?;
        Ok(Self { width, height })
    }
}

/// Overview canvas layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    /// Thumbnails per row.
    pub columns: u32,
    /// Number of rows.
    pub rows: u32,
    /// Size every thumbnail is resized to.
    pub thumbnail: Size,
    /// Band above the grid holding the title.
    pub header: u32,
    /// Band below the grid holding the attribution.
    pub footer: u32,
    /// Output base name; the style is appended.
    pub output_name: String,
    /// Title template; `{day}` is replaced by the ISO date.
    pub title: String,
    /// Attribution template; `{year}` is replaced by the year.
    pub attribution: String,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            columns: 4,
            rows: 6,
            thumbnail: Size {
                width: 360,
                height: 240,
            },
            header: 40,
            footer: 40,
            output_name: "canvas".to_string(),
            title: "Hourly overview of HF propagation for {day}".to_string(),
            attribution: "(c){year} W6BSD https://bsdworld.org/".to_string(),
        }
    }
}

impl MosaicConfig {
    /// Number of thumbnails the grid can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Canvas dimensions including header and footer, bounded by
    /// [`MAX_CANVAS_PIXELS`].
    pub fn canvas_size(&self) -> Result<Size, ConfigError> {
        let too_large = || ConfigError::CanvasTooLarge {
            columns: self.columns,
            rows: self.rows,
            thumbnail: self.thumbnail,
        };
        let width = self
            .columns
            .checked_mul(self.thumbnail.width)
            .ok_or_else(too_large)?;
        let height = self
            .rows
            .checked_mul(self.thumbnail.height)
            .and_then(|h| h.checked_add(self.header))
            .and_then(|h| h.checked_add(self.footer))
            .ok_or_else(too_large)?;
        if u64::from(width) * u64::from(height) > MAX_CANVAS_PIXELS {
            return Err(too_large());
        }
        Ok(Size { width, height })
    }
}

impl CurateConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Codec for the configured naming convention.
    pub fn codec(&self) -> SnapshotCodec {
        self.naming.codec()
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for hours in [self.animation_hours, self.retention_hours] {
            if hours == 0 || hours > MAX_HORIZON_HOURS {
                return Err(ConfigError::InvalidHorizon);
            }
        }
        if self.naming.prefix.is_empty() || self.naming.extension.is_empty() {
            return Err(ConfigError::EmptyNaming);
        }
        if self.naming.prefix.contains(['-', '/']) {
            return Err(ConfigError::InvalidPrefix(self.naming.prefix.clone()));
        }
        let name = &self.workspace.name;
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::InvalidWorkspaceName(name.clone()));
        }
        if self.encoder.frame_rate == 0 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if self.mosaic.columns == 0 || self.mosaic.rows == 0 {
            return Err(ConfigError::InvalidGrid);
        }
        if self.mosaic.thumbnail.width == 0 || self.mosaic.thumbnail.height == 0 {
            return Err(ConfigError::InvalidSize(format!(
                "{}x{}",
                self.mosaic.thumbnail.width, self.mosaic.thumbnail.height
            )));
        }
        self.mosaic.canvas_size()?;
        Ok(())
    }
}

/// Resolve a day selector: `today`, `yesterday` or `YYYYMMDD`.
pub fn parse_day(arg: &str, today: NaiveDate) -> Result<NaiveDate, ConfigError> {
    match arg.to_ascii_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => today
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| ConfigError::InvalidDay(arg.to_string())),
        _ => NaiveDate::parse_from_str(arg, "%Y%m%d")
            .map_err(|_| ConfigError::InvalidDay(arg.to_string())),
    }
}

/// Require an existing directory.
pub fn require_dir(path: &Path) -> Result<(), ConfigError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingDirectory(path.to_path_buf()))
    }
}

/// Configuration errors. All of these are fatal before any work starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Horizons must be between one hour and {MAX_HORIZON_HOURS} hours")]
    InvalidHorizon,
    #[error("Snapshot prefix and extension must be non-empty")]
    EmptyNaming,
    #[error("Snapshot prefix {0:?} must not contain '-' or '/'")]
    InvalidPrefix(String),
    #[error("Invalid workspace name {0:?}")]
    InvalidWorkspaceName(String),
    #[error("Frame rate must be non-zero")]
    InvalidFrameRate,
    #[error("Grid columns and rows must be non-zero")]
    InvalidGrid,
    #[error("Invalid size {0:?}, expected WIDTHxHEIGHT")]
    InvalidSize(String),
    #[error(
        "A {columns}x{rows} grid of {}x{} thumbnails exceeds {MAX_CANVAS_PIXELS} pixels",
        thumbnail.width,
        thumbnail.height
    )]
    CanvasTooLarge {
        columns: u32,
        rows: u32,
        thumbnail: Size,
    },
    #[error("Invalid day {0:?}, expected YYYYMMDD, today or yesterday")]
    InvalidDay(String),
    #[error("Unknown style {0:?}, expected light or dark")]
    UnknownStyle(String),
    #[error("Unknown continent {0:?}")]
    UnknownContinent(String),
    #[error("Directory {0} does not exist")]
    MissingDirectory(PathBuf),
}
