//! Daily overview canvas: the top-of-hour snapshots of one day, one style,
//! resized and laid out row-major on a captioned grid.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use chrono::{Datelike, NaiveDate, Timelike};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use log::{info, warn};

use super::caption::{draw_text, text_width};
use super::encoder::PublishError;
use super::invoke::publish_atomic;
use crate::curate::{
    FrameNaming, MaterializeError, ScanMode, SelectError, SequenceEntry, Workspace,
    WorkspaceError, materialize, scan,
};
use crate::interrupt::CancelToken;
use crate::schema::{ConfigError, CurateConfig, MosaicConfig, SnapshotCodec, SnapshotFile, Style};

const TITLE_SCALE: u32 = 3;
const TITLE_TOP: i64 = 10;
const ATTRIBUTION_SCALE: u32 = 2;
const ATTRIBUTION_LEFT: i64 = 10;

/// Background and foreground colours for a style.
pub fn palette(style: Style) -> (Rgba<u8>, Rgba<u8>) {
    match style {
        Style::Dark => (Rgba([0x0c, 0x0c, 0x0c, 0xff]), Rgba([0xee, 0xee, 0xee, 0xff])),
        Style::Light => (Rgba([0xff, 0xff, 0xff, 0xff]), Rgba([0x00, 0x00, 0x00, 0xff])),
    }
}

/// What a compose run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicReport {
    /// The published canvas.
    pub canvas: PathBuf,
    /// Style-less alias, refreshed for the light style only.
    pub alias: Option<PathBuf>,
    /// Thumbnails pasted on the grid.
    pub placed: usize,
    /// Snapshots beyond the grid capacity.
    pub dropped: usize,
    /// Snapshots that could not be decoded; their cell stays empty.
    pub unreadable: usize,
}

/// Builds the overview canvas for one directory.
#[derive(Debug, Clone, Copy)]
pub struct Mosaic<'a> {
    config: &'a CurateConfig,
}

impl<'a> Mosaic<'a> {
    pub fn new(config: &'a CurateConfig) -> Self {
        Self { config }
    }

    fn layout(&self) -> &MosaicConfig {
        &self.config.mosaic
    }

    /// Canvas path for `style` inside `dir`.
    pub fn canvas_path(&self, dir: &Path, style: Style) -> PathBuf {
        dir.join(format!("{}-{}.png", self.layout().output_name, style))
    }

    /// Style-less alias path inside `dir`.
    pub fn alias_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.png", self.layout().output_name))
    }

    /// Compose the canvas for `day` and `style` from the snapshots directly
    /// under `source`, and publish it next to them.
    pub fn compose(
        &self,
        source: &Path,
        day: NaiveDate,
        style: Style,
        cancel: &CancelToken,
    ) -> Result<MosaicReport, MosaicError> {
        self.layout().canvas_size()?;
        let mut files = select_day(source, day, style, &self.config.codec())?;
        let capacity = self.layout().capacity();
        let dropped = files.len().saturating_sub(capacity);
        if dropped > 0 {
            info!("{} snapshots beyond the {} grid cells ignored", dropped, capacity);
            files.truncate(capacity);
        }
        if files.is_empty() {
            warn!("No {} snapshots for {} in {}", style, day, source.display());
        }

        let mut workspace = Workspace::create(source, &self.config.workspace.dir_name())?;
        let frames = materialize(
            &files,
            workspace.path(),
            &FrameNaming::from(&self.config.naming),
        )?;

        let (mut canvas, unreadable) = self.render_grid(&frames, style, cancel)?;
        self.caption(&mut canvas, day, style);

        let staged = workspace.join(format!(
            "{}-{}.png",
            self.layout().output_name,
            process::id()
        ));
        DynamicImage::ImageRgba8(canvas)
            .to_rgb8()
            .save(&staged)
            .map_err(|source| MosaicError::Image {
                path: staged.clone(),
                source,
            })?;

        let canvas_path = self.canvas_path(source, style);
        publish_atomic(&staged, &canvas_path)?;
        info!("{} saved", canvas_path.display());

        let alias = match style {
            Style::Light => {
                let alias = self.alias_path(source);
                replace_link(&canvas_path, &alias)?;
                info!("Link to \"{}\" created", alias.display());
                Some(alias)
            }
            Style::Dark => None,
        };

        workspace.destroy()?;
        Ok(MosaicReport {
            canvas: canvas_path,
            alias,
            placed: frames.len() - unreadable,
            dropped,
            unreadable,
        })
    }

    /// Paste every frame at its row-major cell.
    fn render_grid(
        &self,
        frames: &[SequenceEntry],
        style: Style,
        cancel: &CancelToken,
    ) -> Result<(RgbaImage, usize), MosaicError> {
        let layout = self.layout();
        let size = layout.canvas_size()?;
        let (background, _) = palette(style);
        let mut canvas = RgbaImage::from_pixel(size.width, size.height, background);
        let (w, h) = (layout.thumbnail.width, layout.thumbnail.height);

        let mut unreadable = 0;
        for (cell, frame) in frames.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(MosaicError::Interrupted);
            }
            let thumbnail = match image::open(&frame.link) {
                Ok(img) => img.resize_exact(w, h, FilterType::Lanczos3).to_rgba8(),
                Err(err) => {
                    warn!("Cannot read {}: {}", frame.source.display(), err);
                    unreadable += 1;
                    continue;
                }
            };
            let col = cell as u32 % layout.columns;
            let row = cell as u32 / layout.columns;
            imageops::replace(
                &mut canvas,
                &thumbnail,
                i64::from(col * w),
                i64::from(row * h + layout.header),
            );
        }
        Ok((canvas, unreadable))
    }

    /// Title centred in the header, attribution at the bottom left.
    fn caption(&self, canvas: &mut RgbaImage, day: NaiveDate, style: Style) {
        let layout = self.layout();
        let (_, ink) = palette(style);
        let title = layout
            .title
            .replace("{day}", &day.format("%Y-%m-%d").to_string());
        let attribution = layout.attribution.replace("{year}", &day.year().to_string());

        let x = (i64::from(canvas.width()) - i64::from(text_width(&title, TITLE_SCALE))) / 2;
        draw_text(canvas, x, TITLE_TOP, &title, TITLE_SCALE, ink);

        let y = i64::from(canvas.height()) - i64::from(layout.footer) * 2 / 3;
        draw_text(canvas, ATTRIBUTION_LEFT, y, &attribution, ATTRIBUTION_SCALE, ink);
    }
}

/// Snapshots directly under `source` taken exactly on the hour during
/// `day` (UTC) in `style`, in chronological order.
pub fn select_day(
    source: &Path,
    day: NaiveDate,
    style: Style,
    codec: &SnapshotCodec,
) -> Result<Vec<SnapshotFile>, SelectError> {
    let selection = scan(source, ScanMode::Flat, codec, |file| {
        file.style == Some(style)
            && file.timestamp.date_naive() == day
            && file.timestamp.minute() == 0
            && file.timestamp.second() == 0
    })?;
    Ok(selection.files)
}

/// Point `alias` at the same inode as `target`, replacing any previous alias.
fn replace_link(target: &Path, alias: &Path) -> Result<(), PublishError> {
    let staged = alias.with_file_name(format!(
        ".{}.{}.link",
        alias
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        process::id()
    ));
    let link_error = |source: io::Error| PublishError {
        from: target.to_path_buf(),
        to: alias.to_path_buf(),
        source,
    };
    match fs::remove_file(&staged) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(link_error(err)),
        _ => {}
    }
    fs::hard_link(target, &staged).map_err(link_error)?;
    fs::rename(&staged, alias).map_err(|err| {
        let _ = fs::remove_file(&staged);
        link_error(err)
    })
}

/// Compose errors.
#[derive(Debug, thiserror::Error)]
pub enum MosaicError {
    #[error(transparent)]
    Layout(#[from] ConfigError),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error("Cannot write {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("Interrupted")]
    Interrupted,
}
