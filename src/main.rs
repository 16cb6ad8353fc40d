//! animdxcc CLI - Animate, purge and stitch DXCC propagation snapshots.

use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use log::{error, info};

use animdxcc::{
    curate::{FrameNaming, migrate_legacy, sweep},
    interrupt::{self, CancelToken},
    pipeline::Animator,
    render::{FfmpegEncoder, Mosaic, MosaicError},
    schema::{CONTINENTS, ConfigError, CurateConfig, Size, Style, Zone, parse_day, require_dir},
};

const EXIT_FAILURES: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "animdxcc",
    version,
    about = "DXCC propagation snapshot curation"
)]
struct Cli {
    /// JSON configuration file; command line flags override it
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log file used when stdout is not a terminal
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one video per zone from the recent snapshots
    Animate(AnimateArgs),
    /// Delete snapshots older than the retention horizon
    Purge(PurgeArgs),
    /// Stitch one day of hourly snapshots into an overview canvas
    Stitch(StitchArgs),
    /// Rename compact-timestamp snapshots to the delimited form
    Rename(RenameArgs),
}

#[derive(Parser)]
struct AnimateArgs {
    /// Continents to animate
    #[arg(short = 'c', long = "continent", num_args = 1.., value_parser = clap::builder::PossibleValuesParser::new(CONTINENTS))]
    continents: Vec<String>,

    /// CQ zone numbers
    #[arg(short = 'C', long = "cqzone", num_args = 1..)]
    cq_zones: Vec<u32>,

    /// ITU zone numbers
    #[arg(short = 'I', long = "ituzone", num_args = 1..)]
    itu_zones: Vec<u32>,

    /// Number of hours to animate
    #[arg(short = 'H', long)]
    hours: Option<u32>,

    /// Directory where the images are located
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Directory to store the videos
    #[arg(short, long)]
    video_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct PurgeArgs {
    /// Only report what would be deleted
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Root of the snapshot tree
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Number of hours to keep
    #[arg(short = 'H', long)]
    hours: Option<u32>,
}

#[derive(Parser)]
struct StitchArgs {
    /// Directory containing the propagation graphs images
    #[arg(short, long)]
    path: PathBuf,

    /// Output style
    #[arg(short, long)]
    style: Style,

    /// Day to stitch: YYYYMMDD, today or yesterday
    #[arg(short, long, default_value = "yesterday")]
    day: String,

    /// Number of columns
    #[arg(short, long)]
    columns: Option<u32>,

    /// Number of rows
    #[arg(short, long)]
    rows: Option<u32>,

    /// Thumbnail size, WIDTHxHEIGHT
    #[arg(short = 'S', long = "thumbnails-size")]
    thumbnail: Option<Size>,

    /// Output image name, without the extension
    #[arg(short, long = "output-name")]
    output_name: Option<String>,
}

#[derive(Parser)]
struct RenameArgs {
    /// Directory holding the snapshots
    dir: PathBuf,
}

impl Commands {
    /// Log destination when stdout is not a terminal.
    fn default_log(&self) -> &'static str {
        match self {
            Commands::Animate(_) => "/tmp/animdxcc.log",
            Commands::Purge(_) => "/tmp/purge_images.log",
            Commands::Stitch(_) => "/tmp/stitch.log",
            Commands::Rename(_) => "/tmp/rename_files.log",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref(), cli.command.default_log());

    if let Err(err) = interrupt::install_handlers() {
        error!("Cannot install signal handlers: {}", err);
        return ExitCode::from(EXIT_CONFIG);
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let result = match cli.command {
        Commands::Animate(args) => run_animate(config, args),
        Commands::Purge(args) => run_purge(config, args),
        Commands::Stitch(args) => run_stitch(config, args),
        Commands::Rename(args) => run_rename(config, args),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

fn init_logging(log_file: Option<&Path>, default_log: &str) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::new().filter_or("LOG_LEVEL", "info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {}:{:3} {} - {}",
            Local::now().format("%x %X"),
            record.target(),
            record.line().unwrap_or_default(),
            record.level(),
            record.args()
        )
    });
    if !io::stdout().is_terminal() {
        let path = log_file.unwrap_or_else(|| Path::new(default_log));
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(err) => eprintln!("Cannot open log file {}: {}", path.display(), err),
        }
    }
    builder.init();
}

fn load_config(path: Option<&Path>) -> Result<CurateConfig, ConfigError> {
    match path {
        Some(path) => CurateConfig::from_file(path),
        None => Ok(CurateConfig::default()),
    }
}

fn run_animate(mut config: CurateConfig, args: AnimateArgs) -> Result<ExitCode, ConfigError> {
    if let Some(hours) = args.hours {
        config.animation_hours = hours;
    }
    if let Some(source) = args.source {
        config.source_dir = source;
    }
    if let Some(video_dir) = args.video_dir {
        config.video_dir = video_dir;
    }
    config.validate()?;
    require_dir(&config.source_dir)?;
    require_dir(&config.video_dir)?;

    let mut zones = args
        .continents
        .iter()
        .map(|code| Zone::continent(code))
        .collect::<Result<Vec<_>, _>>()?;
    zones.extend(args.cq_zones.into_iter().map(Zone::cq));
    zones.extend(args.itu_zones.into_iter().map(Zone::itu));
    if zones.is_empty() {
        info!("No zone requested");
        return Ok(ExitCode::SUCCESS);
    }

    let encoder = FfmpegEncoder::new(config.encoder.clone(), FrameNaming::from(&config.naming));
    let animator = Animator::new(&config, encoder, CancelToken::with_signals());
    if let Err(err) = animator.ensure_available() {
        error!("{}", err);
        return Ok(ExitCode::from(EXIT_CONFIG));
    }

    let report = animator.run_batch(&zones, Utc::now());
    Ok(if report.interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else if report.failures() > 0 {
        ExitCode::from(EXIT_FAILURES)
    } else {
        ExitCode::SUCCESS
    })
}

fn run_purge(mut config: CurateConfig, args: PurgeArgs) -> Result<ExitCode, ConfigError> {
    if let Some(hours) = args.hours {
        config.retention_hours = hours;
    }
    if let Some(source) = args.source {
        config.source_dir = source;
    }
    config.validate()?;
    require_dir(&config.source_dir)?;

    match sweep(
        &config.source_dir,
        config.retention_hours,
        args.dry_run,
        Utc::now(),
        &config.codec(),
        &CancelToken::with_signals(),
    ) {
        Ok(report) if report.interrupted => Ok(ExitCode::from(EXIT_INTERRUPTED)),
        Ok(report) if report.failed > 0 => Ok(ExitCode::from(EXIT_FAILURES)),
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            error!("{}", err);
            Ok(ExitCode::from(EXIT_FAILURES))
        }
    }
}

fn run_stitch(mut config: CurateConfig, args: StitchArgs) -> Result<ExitCode, ConfigError> {
    if let Some(columns) = args.columns {
        config.mosaic.columns = columns;
    }
    if let Some(rows) = args.rows {
        config.mosaic.rows = rows;
    }
    if let Some(thumbnail) = args.thumbnail {
        config.mosaic.thumbnail = thumbnail;
    }
    if let Some(output_name) = args.output_name {
        config.mosaic.output_name = output_name;
    }
    config.validate()?;
    require_dir(&args.path)?;
    let day = parse_day(&args.day, Utc::now().date_naive())?;

    match Mosaic::new(&config).compose(&args.path, day, args.style, &CancelToken::with_signals()) {
        Ok(report) => {
            info!(
                "{}: {} thumbnails, {} dropped",
                report.canvas.display(),
                report.placed,
                report.dropped
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(MosaicError::Interrupted) => Ok(ExitCode::from(EXIT_INTERRUPTED)),
        Err(err) => {
            error!("{}", err);
            Ok(ExitCode::from(EXIT_FAILURES))
        }
    }
}

fn run_rename(config: CurateConfig, args: RenameArgs) -> Result<ExitCode, ConfigError> {
    config.validate()?;
    require_dir(&args.dir)?;

    match migrate_legacy(&args.dir, &config.codec(), &CancelToken::with_signals()) {
        Ok(report) => {
            println!(
                "{} renamed, {} skipped, {} failed",
                report.renamed, report.skipped, report.failed
            );
            if report.interrupted {
                Ok(ExitCode::from(EXIT_INTERRUPTED))
            } else if report.failed > 0 {
                Ok(ExitCode::from(EXIT_FAILURES))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Err(err) => {
            error!("{}", err);
            Ok(ExitCode::from(EXIT_FAILURES))
        }
    }
}
