use crate::media::MediaKind;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("Invalid target size format: {0:?} (expected e.g. 500KB or 2MB)")]
    InvalidTargetSize(String),

    #[error("Input file does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("failed to probe {}: {reason}", .path.display())]
    Probe { path: PathBuf, reason: String },

    #[error("{0}")]
    UnsupportedMedia(String),

    #[error("output {} is the input file itself", .0.display())]
    SameFile(PathBuf),

    #[error("{tool} unavailable: {reason}")]
    ToolNotFound { tool: &'static str, reason: String },

    #[error("output directory {} is not usable: {source}", .dir.display())]
    DirectoryAccess {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{tool} {stage} failed at {parameter} ({status}): {stderr}")]
    EncoderInvocation {
        tool: String,
        stage: String,
        parameter: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error(
        "could not compress {kind} to target size {target} bytes (final size: {})",
        .last_size.map_or_else(|| "none".to_string(), |s| format!("{s} bytes"))
    )]
    Convergence {
        kind: MediaKind,
        target: u64,
        last_size: Option<u64>,
    },

    #[error("failed to decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("JPEG encode failed at quality {quality}: {source}")]
    ImageEncode {
        quality: u8,
        #[source]
        source: image::ImageError,
    },

    #[error("{context} {}: {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CompressError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = CompressError> = std::result::Result<T, E>;
