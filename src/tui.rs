use crate::cli::{default_output, AppConfig};
use crate::compress::Job;
use crate::media::IMAGE_EXTENSIONS;
use crate::size::{human_bytes, validate_target_size};
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Input};
use std::path::{Path, PathBuf};

/// Prompts for the job; tool overrides and verbosity come from the command line.
pub fn interactive_config(
    verbose: bool,
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
) -> Result<AppConfig> {
    println!("Interactive Media Compressor");
    println!("Press Enter to accept the suggested value.\n");

    let theme = ColorfulTheme::default();
    let input = loop {
        let raw: String = Input::with_theme(&theme)
            .with_prompt("Input image or video path")
            .interact_text()?;
        let path = PathBuf::from(raw.trim());
        if path.is_file() {
            break path;
        } else {
            println!("File not found, please try again.");
        }
    };

    let default_out = default_output(&input, looks_like_image(&input))?;
    let out_prompt = format!(
        "Output file path [{}]",
        default_out.as_os_str().to_string_lossy()
    );
    let raw_out: String = Input::with_theme(&theme)
        .with_prompt(out_prompt)
        .allow_empty(true)
        .interact_text()?;
    let output = if raw_out.trim().is_empty() {
        default_out
    } else {
        PathBuf::from(raw_out.trim())
    };

    if let Ok(meta) = std::fs::metadata(&input) {
        println!("Input is {}.", human_bytes(meta.len()));
    }
    let target = loop {
        let raw: String = Input::with_theme(&theme)
            .with_prompt("Target size (e.g. 500KB, 2MB)")
            .interact_text()?;
        match validate_target_size(raw.trim()) {
            Ok(target) => break target,
            Err(err) => println!("{err}"),
        }
    };

    Ok(AppConfig {
        job: Job {
            input,
            output,
            target,
        },
        verbose,
        ffmpeg,
        ffprobe,
    })
}

/// Extension-only guess, used for the suggested output name before probing.
fn looks_like_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_image() {
        assert!(looks_like_image(Path::new("a.HEIC")));
        assert!(looks_like_image(Path::new("dir/a.jpeg")));
        assert!(!looks_like_image(Path::new("a.mp4")));
        assert!(!looks_like_image(Path::new("README")));
    }
}
