//! ffmpeg as the video encoder.

use std::env;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use super::encoder::{EncodeJob, EncodeOutcome, Encoder, InvokeError};
use crate::curate::{FrameNaming, INDEX_ORIGIN};
use crate::interrupt::CancelToken;
use crate::schema::{EncoderConfig, FramePattern};

/// How often a running encoder is checked for exit and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs ffmpeg as a child process, appending its output to a log file.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    config: EncoderConfig,
    naming: FrameNaming,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig, naming: FrameNaming) -> Self {
        Self { config, naming }
    }

    /// Locate the executable: a bare name is looked up on `PATH`.
    pub fn resolve_binary(&self) -> Option<PathBuf> {
        find_executable(&self.config.binary)
    }

    /// Command line arguments, without the program.
    pub fn args(&self, frames_dir: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-framerate".into(),
            self.config.frame_rate.to_string().into(),
        ];
        match self.config.frame_pattern {
            FramePattern::Printf => {
                args.push("-start_number".into());
                args.push(INDEX_ORIGIN.to_string().into());
                args.push("-i".into());
                args.push(frames_dir.join(self.naming.printf_pattern()).into());
            }
            FramePattern::Glob => {
                args.push("-pattern_type".into());
                args.push("glob".into());
                args.push("-i".into());
                args.push(frames_dir.join(self.naming.glob_pattern()).into());
            }
        }
        for arg in [
            "-c:v",
            self.config.codec.as_str(),
            "-pix_fmt",
            self.config.pixel_format.as_str(),
            "-vf",
        ] {
            args.push(arg.into());
        }
        args.push(format!("scale={}", self.config.scale).into());
        args.push(output.into());
        args
    }

    fn open_log(&self) -> Result<File, InvokeError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.log_file)
            .map_err(|source| InvokeError::Log {
                path: self.config.log_file.clone(),
                source,
            })
    }

    fn wait(&self, child: &mut Child, cancel: &CancelToken) -> Result<Wait, InvokeError> {
        let started = Instant::now();
        let timeout = self.config.timeout_secs.map(Duration::from_secs);
        loop {
            match child.try_wait() {
                Ok(Some(_)) if cancel.is_cancelled() => return Err(InvokeError::Interrupted),
                Ok(Some(status)) => return Ok(Wait::Exited(status)),
                Ok(None) => {}
                Err(source) => {
                    return Err(InvokeError::Wait {
                        tool: self.config.binary.clone(),
                        source,
                    });
                }
            }
            if cancel.is_cancelled() {
                stop(child);
                return Err(InvokeError::Interrupted);
            }
            if timeout.is_some_and(|limit| started.elapsed() >= limit) {
                stop(child);
                return Ok(Wait::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

enum Wait {
    Exited(ExitStatus),
    TimedOut,
}

fn stop(child: &mut Child) {
    if let Err(err) = child.kill() {
        warn!("Cannot kill encoder process {}: {}", child.id(), err);
    }
    let _ = child.wait();
}

impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        &self.config.binary
    }

    fn extension(&self) -> &str {
        &self.config.container
    }

    fn ensure_available(&self) -> Result<(), InvokeError> {
        self.resolve_binary()
            .map(|_| ())
            .ok_or_else(|| InvokeError::ToolNotFound(self.config.binary.clone()))
    }

    fn encode(
        &self,
        job: &EncodeJob<'_>,
        cancel: &CancelToken,
    ) -> Result<EncodeOutcome, InvokeError> {
        let binary = self
            .resolve_binary()
            .ok_or_else(|| InvokeError::ToolNotFound(self.config.binary.clone()))?;
        let args = self.args(job.frames_dir, job.output);

        let mut log = self.open_log()?;
        let command_line = std::iter::once(binary.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        let header = writeln!(log, "{}\n", command_line).and_then(|()| log.flush());
        let stdout = header.and_then(|()| log.try_clone()).map_err(|source| InvokeError::Log {
            path: self.config.log_file.clone(),
            source,
        })?;

        info!("Writing {} output in {}", self.name(), self.config.log_file.display());
        info!("Encoding {} frames into {}", job.frame_count, job.output.display());

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(log)
            .spawn()
            .map_err(|source| InvokeError::Spawn {
                tool: binary.display().to_string(),
                source,
            })?;

        match self.wait(&mut child, cancel)? {
            Wait::Exited(status) if status.success() => Ok(EncodeOutcome::Success),
            Wait::Exited(status) => {
                error!("Error generating the video file ({})", status);
                Ok(EncodeOutcome::Failed {
                    status: status.code(),
                    reason: format!("{} exited with {}", self.name(), status),
                })
            }
            Wait::TimedOut => {
                error!(
                    "{} killed after {}s",
                    self.name(),
                    self.config.timeout_secs.unwrap_or_default()
                );
                Ok(EncodeOutcome::Failed {
                    status: None,
                    reason: format!("{} timed out", self.name()),
                })
            }
        }
    }
}

/// Resolve `name` like a shell would: paths are checked directly, bare
/// names are searched on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|full| is_executable(full))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
