use crate::error::{CompressError, Result};
use crate::ffmpeg::{resolve_ffmpeg, FfmpegTwoPass};
use crate::image_search::{compress_image, JpegCodec, QualityEncoder};
use crate::media::{classify, MediaKind, MediaProbe};
use crate::scratch;
use crate::search::Completion;
use crate::size::TargetSize;
use crate::video_search::{compress_video, BitrateEncoder};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, info_span};

#[derive(Debug, Clone)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
    pub target: TargetSize,
}

#[derive(Debug, Clone)]
pub struct CompressionReport {
    pub output: PathBuf,
    pub kind: MediaKind,
    pub target: TargetSize,
    pub final_size: u64,
    pub completion: Completion,
}

/// Builds the encoders a job needs once its media kind is known.
pub trait Codecs {
    type Image: QualityEncoder;
    type Video: BitrateEncoder;

    fn image_encoder(&self, input: &Path) -> Result<Self::Image>;
    fn video_encoder(&self, input: &Path, duration_seconds: f64) -> Result<Self::Video>;
}

/// In-process JPEG for images; ffmpeg, looked up on first use, for video.
pub struct SystemCodecs {
    pub ffmpeg: Option<PathBuf>,
    pub verbose: bool,
}

impl Codecs for SystemCodecs {
    type Image = JpegCodec;
    type Video = FfmpegTwoPass;

    fn image_encoder(&self, input: &Path) -> Result<JpegCodec> {
        JpegCodec::open(input)
    }

    fn video_encoder(&self, input: &Path, duration_seconds: f64) -> Result<FfmpegTwoPass> {
        let ffmpeg = resolve_ffmpeg(self.ffmpeg.clone())?;
        debug!(ffmpeg = %ffmpeg.display(), "resolved ffmpeg");
        Ok(FfmpegTwoPass::new(ffmpeg, input, duration_seconds, self.verbose))
    }
}

pub fn run<P, C>(job: &Job, probe: &P, codecs: &C) -> Result<CompressionReport>
where
    P: MediaProbe + ?Sized,
    C: Codecs + ?Sized,
{
    let span = info_span!(
        "compress",
        input = %job.input.display(),
        target_bytes = job.target.bytes()
    );
    let _enter = span.enter();

    info!(output = %job.output.display(), "starting compression");
    if !job.input.is_file() {
        error!("input file does not exist");
        return Err(CompressError::InputNotFound(job.input.clone()));
    }

    let descriptor = probe.probe(&job.input)?;
    let kind = classify(&job.input, &descriptor);
    info!(%kind, format_name = %descriptor.format_name, "classified input");

    let completion = match kind {
        MediaKind::Image => {
            scratch::ensure_output_dir(&job.output)?;
            let mut encoder = codecs.image_encoder(&job.input)?;
            compress_image(&mut encoder, &job.input, &job.output, job.target)?
        }
        MediaKind::Video => {
            let duration = descriptor.duration_seconds;
            if !(duration > 0.0 && duration.is_finite()) {
                error!(duration, "Invalid video duration");
                return Err(CompressError::UnsupportedMedia(format!(
                    "Invalid video duration: {duration}"
                )));
            }
            let mut encoder = codecs.video_encoder(&job.input, duration)?;
            compress_video(&mut encoder, &job.input, &job.output, job.target, duration)?
        }
    };

    let final_size = scratch::file_size(&job.output)?;
    info!(final_size, %completion, "compression completed");
    Ok(CompressionReport {
        output: job.output.clone(),
        kind,
        target: job.target,
        final_size,
        completion,
    })
}
