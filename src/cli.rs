use crate::compress::Job;
use crate::size::parse_target_size;
use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "compress_media",
    version,
    about = "Compress an image or video to land near a target file size"
)]
pub struct Cli {
    /// Input image or video file
    #[arg(value_hint = ValueHint::FilePath, required_unless_present = "interactive")]
    pub input: Option<PathBuf>,

    /// Output file (images are written as JPEG, videos as H.264/AAC MP4)
    #[arg(value_hint = ValueHint::FilePath, required_unless_present = "interactive")]
    pub output: Option<PathBuf>,

    /// Target size, e.g. 500KB or 2MB (KB = 1024 bytes, case-insensitive)
    #[arg(required_unless_present = "interactive")]
    pub target_size: Option<String>,

    /// Prompt for input, output and target size
    #[arg(short = 'I', long, action = ArgAction::SetTrue)]
    pub interactive: bool,

    /// Debug logging and raw ffmpeg logs
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Path to ffmpeg binary (overrides PATH lookup)
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    pub ffmpeg: Option<PathBuf>,

    /// Path to ffprobe binary (overrides PATH lookup)
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    pub ffprobe: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub job: Job,
    pub verbose: bool,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

impl Cli {
    pub fn into_config(self) -> Result<AppConfig> {
        let (Some(input), Some(output), Some(raw_target)) =
            (self.input, self.output, self.target_size)
        else {
            bail!("INPUT, OUTPUT and TARGET_SIZE are required unless --interactive is given");
        };
        let target = parse_target_size(&raw_target)?;
        if !input.exists() {
            bail!("Input file does not exist: {}", input.display());
        }

        Ok(AppConfig {
            job: Job {
                input,
                output,
                target,
            },
            verbose: self.verbose,
            ffmpeg: self.ffmpeg,
            ffprobe: self.ffprobe,
        })
    }
}

/// `<dir>/compressed_<name>`, with `.jpg` for images.
pub fn default_output(input: &Path, image: bool) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(OsStr::to_str)
        .with_context(|| format!("cannot derive a file name from {}", input.display()))?;
    let parent = input.parent().unwrap_or(Path::new("."));
    let name = if image {
        format!("compressed_{stem}.jpg")
    } else {
        let ext = input.extension().and_then(OsStr::to_str).unwrap_or("mp4");
        format!("compressed_{stem}.{ext}")
    };
    Ok(parent.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompressError;

    #[test]
    fn test_positional_parsing() {
        let cli = Cli::try_parse_from(["compress_media", "in.mp4", "out.mp4", "2MB"]).unwrap();
        assert_eq!(cli.input.as_deref(), Some(Path::new("in.mp4")));
        assert_eq!(cli.output.as_deref(), Some(Path::new("out.mp4")));
        assert_eq!(cli.target_size.as_deref(), Some("2MB"));
        assert!(!cli.interactive);
    }

    #[test]
    fn test_positionals_required() {
        assert!(Cli::try_parse_from(["compress_media", "in.mp4", "out.mp4"]).is_err());
        assert!(Cli::try_parse_from(["compress_media", "--interactive"]).is_ok());
    }

    #[test]
    fn test_into_config_rejects_bad_target_first() {
        let cli = Cli::try_parse_from(["compress_media", "missing.mp4", "out.mp4", "2GB"]).unwrap();
        let err = cli.into_config().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompressError>(),
            Some(CompressError::InvalidTargetSize(_))
        ));
    }

    #[test]
    fn test_into_config_rejects_missing_input() {
        let cli = Cli::try_parse_from(["compress_media", "missing.mp4", "out.mp4", "2MB"]).unwrap();
        let err = cli.into_config().unwrap_err();
        assert!(err.to_string().contains("Input file does not exist"));
    }

    #[test]
    fn test_into_config_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in.png");
        std::fs::write(&input, b"png").unwrap();
        let cli = Cli::try_parse_from([
            OsStr::new("compress_media"),
            input.as_os_str(),
            OsStr::new("out.jpg"),
            OsStr::new("500kb"),
            OsStr::new("-v"),
        ])
        .unwrap();
        let cfg = cli.into_config().unwrap();
        assert_eq!(cfg.job.target.bytes(), 512_000);
        assert!(cfg.verbose);
    }

    #[test]
    fn test_default_output() {
        assert_eq!(
            default_output(Path::new("media/holiday.png"), true).unwrap(),
            PathBuf::from("media/compressed_holiday.jpg")
        );
        assert_eq!(
            default_output(Path::new("media/clip.mov"), false).unwrap(),
            PathBuf::from("media/compressed_clip.mov")
        );
    }
}
