use crate::error::{CompressError, Result};
use crate::media::{MediaDescriptor, MediaProbe};
use crate::progress::{pump_progress, PassProgress};
use crate::video_search::{BitrateEncoder, AUDIO_BITRATE_KBPS};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};
use which::which;

/// Even width not above the source width; height untouched.
pub const EVEN_WIDTH_SCALE: &str = "scale=trunc(iw/2)*2:ih";

#[cfg(windows)]
const NULL_SINK: &str = "NUL";
#[cfg(not(windows))]
const NULL_SINK: &str = "/dev/null";

const STDERR_TAIL_LINES: usize = 20;

/// A resolved `ffprobe`; every input is probed, so it is looked up before anything runs.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    bin: PathBuf,
}

impl Ffprobe {
    pub fn resolve(bin_opt: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            bin: resolve_bin(bin_opt, "ffprobe")?,
        })
    }
}

/// Only video needs `ffmpeg`; images are encoded in-process.
pub fn resolve_ffmpeg(bin_opt: Option<PathBuf>) -> Result<PathBuf> {
    resolve_bin(bin_opt, "ffmpeg")
}

fn resolve_bin(bin_opt: Option<PathBuf>, default: &'static str) -> Result<PathBuf> {
    let not_found = |reason: String| CompressError::ToolNotFound {
        tool: default,
        reason,
    };
    if let Some(path) = bin_opt {
        if path.is_file() {
            return Ok(path);
        }
        return Err(not_found(format!("Provided binary not found: {}", path.display())));
    }

    which(default)
        .or_else(|_| {
            if cfg!(windows) {
                let exe = format!("{default}.exe");
                which(&exe)
            } else {
                Err(which::Error::CannotFindBinaryPath)
            }
        })
        .map_err(|e| not_found(format!("`{default}` not found in PATH ({e})")))
}

#[derive(Debug, Default, Deserialize)]
struct ProbeJson {
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    #[serde(default)]
    format_name: String,
}

pub fn parse_probe_json(path: &Path, raw: &str) -> Result<MediaDescriptor> {
    let probe_err = |reason: String| CompressError::Probe {
        path: path.to_path_buf(),
        reason,
    };
    let parsed: ProbeJson = serde_json::from_str(raw)
        .map_err(|e| probe_err(format!("unparseable ffprobe output: {e}")))?;
    let duration_seconds = match parsed.format.duration.as_deref().map(str::trim) {
        None | Some("") | Some("N/A") => 0.0,
        Some(s) => s
            .parse::<f64>()
            .map_err(|e| probe_err(format!("cannot parse duration {s:?}: {e}")))?,
    };
    Ok(MediaDescriptor {
        duration_seconds,
        format_name: parsed.format.format_name,
    })
}

impl MediaProbe for Ffprobe {
    fn probe(&self, path: &Path) -> Result<MediaDescriptor> {
        let out = Command::new(&self.bin)
            .args(["-v", "error"])
            .args(["-show_entries", "format=duration,format_name"])
            .args(["-of", "json"])
            .arg(path)
            .output()
            .map_err(|e| CompressError::Probe {
                path: path.to_path_buf(),
                reason: format!("failed to run ffprobe: {e}"),
            })?;
        if !out.status.success() {
            return Err(CompressError::Probe {
                path: path.to_path_buf(),
                reason: format!(
                    "ffprobe error (status {}): {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            });
        }
        let descriptor = parse_probe_json(path, &String::from_utf8_lossy(&out.stdout))?;
        debug!(
            path = %path.display(),
            duration = descriptor.duration_seconds,
            format_name = %descriptor.format_name,
            "media info"
        );
        Ok(descriptor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Analysis,
    Final,
}

impl Pass {
    fn number(self) -> &'static str {
        match self {
            Pass::Analysis => "1",
            Pass::Final => "2",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Pass::Analysis => "pass 1/2",
            Pass::Final => "pass 2/2",
        }
    }
}

/// Arguments for one libx264 pass, excluding the binary itself.
pub fn pass_args(
    input: &Path,
    pass: Pass,
    video_kbps: u32,
    dest: &Path,
    passlog: &Path,
    verbose: bool,
) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    if !verbose {
        args.extend(["-hide_banner", "-nostats", "-loglevel", "error"].map(String::from));
    }
    args.extend(["-y", "-progress", "pipe:1", "-i"].map(String::from));
    args.push(input.display().to_string());
    args.extend(["-c:v", "libx264", "-b:v"].map(String::from));
    args.push(format!("{video_kbps}k"));
    args.extend(["-vf", EVEN_WIDTH_SCALE].map(String::from));
    args.extend(["-pass", pass.number(), "-passlogfile"].map(String::from));
    args.push(passlog.display().to_string());
    match pass {
        Pass::Analysis => {
            args.extend(["-an", "-f", "null", NULL_SINK].map(String::from));
        }
        Pass::Final => {
            args.extend(["-c:a", "aac", "-b:a"].map(String::from));
            args.push(format!("{AUDIO_BITRATE_KBPS}k"));
            args.push(dest.display().to_string());
        }
    }
    args
}

fn stderr_tail(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Two-pass libx264 encoder over a fixed input.
#[derive(Debug, Clone)]
pub struct FfmpegTwoPass {
    ffmpeg: PathBuf,
    input: PathBuf,
    duration_seconds: f64,
    verbose: bool,
}

impl FfmpegTwoPass {
    pub fn new(ffmpeg: PathBuf, input: &Path, duration_seconds: f64, verbose: bool) -> Self {
        Self {
            ffmpeg,
            input: input.to_path_buf(),
            duration_seconds,
            verbose,
        }
    }

    fn run_pass(&self, pass: Pass, video_kbps: u32, dest: &Path, passlog: &Path) -> Result<()> {
        let args = pass_args(&self.input, pass, video_kbps, dest, passlog, self.verbose);
        debug!(stage = pass.label(), command = %args.join(" "), "running ffmpeg");

        let spawn_err = |e| CompressError::io("failed to spawn ffmpeg for", &self.input, e);
        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if self.verbose {
                Stdio::inherit()
            } else {
                Stdio::piped()
            })
            .spawn()
            .map_err(spawn_err)?;

        let pump = child.stdout.take().map(|stdout| {
            let total_ms = (self.duration_seconds * 1000.0).max(1.0) as u64;
            let label = format!("{} @ {video_kbps}k", pass.label());
            pump_progress(stdout, PassProgress::new(total_ms, &label, self.verbose))
        });

        let out = child
            .wait_with_output()
            .map_err(|e| CompressError::io("failed waiting for ffmpeg on", &self.input, e))?;
        if let Some(handle) = pump {
            match handle.join() {
                Ok(Err(err)) => warn!(%err, "progress reader failed"),
                Err(_) => warn!("progress reader panicked"),
                Ok(Ok(())) => {}
            }
        }

        if !out.status.success() {
            return Err(CompressError::EncoderInvocation {
                tool: "ffmpeg".into(),
                stage: pass.label().into(),
                parameter: format!("{video_kbps}k"),
                status: out.status,
                stderr: stderr_tail(&out.stderr),
            });
        }
        Ok(())
    }
}

impl BitrateEncoder for FfmpegTwoPass {
    fn encode(&mut self, video_kbps: u32, dest: &Path, passlog: &Path) -> Result<()> {
        self.run_pass(Pass::Analysis, video_kbps, dest, passlog)?;
        self.run_pass(Pass::Final, video_kbps, dest, passlog)
    }
}
