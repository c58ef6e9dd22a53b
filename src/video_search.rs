use crate::error::{CompressError, Result};
use crate::media::MediaKind;
use crate::scratch::{self, PassLog, VIDEO_SCRATCH_SUFFIX};
use crate::search::{conclude, Completion, SearchOutcome, Trial};
use crate::size::{Fit, TargetSize, ToleranceBand};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const AUDIO_BITRATE_KBPS: u32 = 128;
pub const MIN_VIDEO_BITRATE_KBPS: f64 = 100.0;
pub const MAX_VIDEO_BITRATE_KBPS: f64 = 5000.0;
/// Share of the byte budget given to the streams; the rest is container overhead.
pub const BITRATE_HEADROOM: f64 = 0.9;
/// How far a bound moves past a rejected candidate.
pub const BOUND_MARGIN_KBPS: f64 = 50.0;
pub const MAX_VIDEO_ATTEMPTS: u32 = 5;

/// Video bitrate in kbps; the encoder only ever sees the integer part.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Kbps(pub f64);

impl Kbps {
    pub fn whole(self) -> u32 {
        self.0.max(0.0) as u32
    }
}

impl fmt::Display for Kbps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.whole())
    }
}

pub trait BitrateEncoder {
    /// Two-pass encode into `dest`; the first pass writes its stats under `passlog`.
    fn encode(&mut self, video_kbps: u32, dest: &Path, passlog: &Path) -> Result<()>;
}

/// First candidate from the byte budget, minus the fixed audio track.
pub fn initial_video_bitrate(target: TargetSize, duration_seconds: f64) -> Kbps {
    let total_kbps = (target.bytes() as f64 * 8.0 * BITRATE_HEADROOM) / (duration_seconds * 1000.0);
    Kbps((total_kbps - f64::from(AUDIO_BITRATE_KBPS)).max(MIN_VIDEO_BITRATE_KBPS))
}

fn encode_trial<E: BitrateEncoder + ?Sized>(
    encoder: &mut E,
    bitrate: Kbps,
    output: &Path,
) -> Result<Trial<Kbps>> {
    let scratch = scratch::scratch_for(output, VIDEO_SCRATCH_SUFFIX)?;
    let passlog = PassLog::for_scratch(scratch.path());
    encoder.encode(bitrate.whole(), scratch.path(), passlog.prefix())?;
    drop(passlog);
    Trial::measure(bitrate, scratch)
}

/// Narrows `[floor, ceiling]` around the candidate bitrate until a trial lands in band.
pub fn search_bitrate<E: BitrateEncoder + ?Sized>(
    encoder: &mut E,
    output: &Path,
    band: ToleranceBand,
    initial: Kbps,
) -> Result<SearchOutcome> {
    let mut floor = MIN_VIDEO_BITRATE_KBPS;
    let mut ceiling = MAX_VIDEO_BITRATE_KBPS;
    let mut candidate = initial.0;
    let mut last: Option<Trial<Kbps>> = None;

    for attempt in 1..=MAX_VIDEO_ATTEMPTS {
        if let Some(previous) = last.take() {
            previous.discard();
        }

        let bitrate = Kbps(candidate);
        debug!(attempt, bitrate_kbps = bitrate.whole(), floor, ceiling, "video trial");
        let trial = encode_trial(encoder, bitrate, output)?;
        debug!(attempt, size = trial.size, target_bytes = band.target(), "video trial measured");

        if band.fit(trial.size) == Fit::Primary {
            let size = trial.accept(output)?;
            info!(bitrate_kbps = bitrate.whole(), size, "video compression successful");
            return Ok(SearchOutcome::Accepted(size));
        }

        if band.is_too_large(trial.size) {
            ceiling = candidate - BOUND_MARGIN_KBPS;
            candidate = (candidate + floor) / 2.0;
        } else {
            floor = candidate + BOUND_MARGIN_KBPS;
            candidate = (candidate + ceiling) / 2.0;
        }
        last = Some(trial);

        if ceiling <= floor {
            debug!(floor, ceiling, "bitrate range collapsed");
            break;
        }
    }

    conclude(MediaKind::Video, last, band, output)
}

pub fn compress_video<E: BitrateEncoder + ?Sized>(
    encoder: &mut E,
    input: &Path,
    output: &Path,
    target: TargetSize,
    duration_seconds: f64,
) -> Result<Completion> {
    if !(duration_seconds > 0.0 && duration_seconds.is_finite()) {
        return Err(CompressError::UnsupportedMedia(format!(
            "Invalid video duration: {duration_seconds}"
        )));
    }
    if scratch::is_same_file(input, output) {
        return Err(CompressError::SameFile(output.to_path_buf()));
    }
    scratch::ensure_output_dir(output)?;
    let input_size = scratch::file_size(input)?;
    info!(input_size, target_bytes = target.bytes(), duration_seconds, "compressing video");

    if target.is_already_met_by(input_size) {
        info!("input is smaller than or close to target, copying input file");
        fs::copy(input, output)
            .map_err(|e| CompressError::io("failed to copy input to", output, e))?;
        return Ok(Completion::AlreadySmall);
    }

    let initial = initial_video_bitrate(target, duration_seconds);
    search_bitrate(encoder, output, target.band(), initial)?
        .into_completion(MediaKind::Video, target.bytes())
}
