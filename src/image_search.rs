use crate::error::{CompressError, Result};
use crate::media::MediaKind;
use crate::scratch::{self, IMAGE_SCRATCH_SUFFIX};
use crate::search::{conclude, Completion, SearchOutcome, Trial};
use crate::size::{Fit, TargetSize, ToleranceBand};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageReader, RgbImage};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MIN_QUALITY: u8 = 5;
pub const MAX_QUALITY: u8 = 95;
pub const DEFAULT_QUALITY: u8 = 85;
pub const MAX_IMAGE_ATTEMPTS: u32 = 10;

pub trait QualityEncoder {
    fn encode(&mut self, quality: u8, sink: &mut dyn Write) -> Result<()>;
}

/// Decoded source pixels, re-encoded as baseline JPEG per trial.
pub struct JpegCodec {
    pixels: RgbImage,
}

impl JpegCodec {
    pub fn open(path: &Path) -> Result<Self> {
        let decode_err = |source| CompressError::Decode {
            path: PathBuf::from(path),
            source,
        };
        let reader = ImageReader::open(path)
            .map_err(|e| CompressError::io("failed to open image", path, e))?
            .with_guessed_format()
            .map_err(|e| CompressError::io("failed to sniff image format of", path, e))?;
        let image = reader.decode().map_err(decode_err)?;
        debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            "decoded source image"
        );
        Ok(Self::from_rgb(image.to_rgb8()))
    }

    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }
}

impl QualityEncoder for JpegCodec {
    fn encode(&mut self, quality: u8, sink: &mut dyn Write) -> Result<()> {
        JpegEncoder::new_with_quality(sink, quality)
            .encode_image(&self.pixels)
            .map_err(|source| CompressError::ImageEncode { quality, source })
    }
}

fn encode_trial<E: QualityEncoder + ?Sized>(
    encoder: &mut E,
    quality: u8,
    output: &Path,
) -> Result<Trial<u8>> {
    let mut scratch = scratch::scratch_for(output, IMAGE_SCRATCH_SUFFIX)?;
    let path = scratch.path().to_path_buf();
    {
        let mut writer = BufWriter::new(scratch.as_file_mut());
        encoder.encode(quality, &mut writer)?;
        writer
            .flush()
            .map_err(|e| CompressError::io("failed to write", &path, e))?;
    }
    Trial::measure(quality, scratch)
}

/// Binary search over integer JPEG quality.
pub fn search_quality<E: QualityEncoder + ?Sized>(
    encoder: &mut E,
    output: &Path,
    band: ToleranceBand,
) -> Result<SearchOutcome> {
    let mut min_quality = i32::from(MIN_QUALITY);
    let mut max_quality = i32::from(MAX_QUALITY);
    let mut last: Option<Trial<u8>> = None;

    for attempt in 1..=MAX_IMAGE_ATTEMPTS {
        if let Some(previous) = last.take() {
            previous.discard();
        }

        // min and max stay inside [MIN_QUALITY, MAX_QUALITY] while max > min
        let quality = ((min_quality + max_quality) / 2) as u8;
        let trial = encode_trial(encoder, quality, output)?;
        debug!(attempt, quality, size = trial.size, target_bytes = band.target(), "image trial");

        if band.fit(trial.size) == Fit::Primary {
            let size = trial.accept(output)?;
            info!(quality, size, "image compression successful");
            return Ok(SearchOutcome::Accepted(size));
        }

        if band.is_too_large(trial.size) {
            max_quality = i32::from(quality) - 1;
        } else {
            min_quality = i32::from(quality) + 1;
        }
        last = Some(trial);

        if max_quality <= min_quality {
            debug!(min_quality, max_quality, "quality range exhausted");
            break;
        }
    }

    conclude(MediaKind::Image, last, band, output)
}

pub fn compress_image<E: QualityEncoder + ?Sized>(
    encoder: &mut E,
    input: &Path,
    output: &Path,
    target: TargetSize,
) -> Result<Completion> {
    scratch::ensure_output_dir(output)?;
    let input_size = scratch::file_size(input)?;
    info!(input_size, target_bytes = target.bytes(), "compressing image");

    if target.is_already_met_by(input_size) {
        info!("input is smaller than or close to target, saving as JPEG");
        encode_trial(encoder, DEFAULT_QUALITY, output)?.accept(output)?;
        return Ok(Completion::AlreadySmall);
    }

    search_quality(encoder, output, target.band())?
        .into_completion(MediaKind::Image, target.bytes())
}
