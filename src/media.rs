use crate::error::Result;
use std::fmt;
use std::path::Path;
use tracing::debug;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "heif"];
pub const IMAGE_FORMATS: &[&str] = &["jpeg", "jpg", "png", "heic", "heif", "image2"];

#[derive(Debug, Clone, PartialEq)]
pub struct MediaDescriptor {
    /// Container duration in seconds; 0.0 when the probe reports none (still images).
    pub duration_seconds: f64,
    pub format_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        })
    }
}

pub trait MediaProbe {
    fn probe(&self, path: &Path) -> Result<MediaDescriptor>;
}

/// Both the extension and the probed container format must agree on "image".
pub fn is_image(path: &Path, format_name: &str) -> bool {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        debug!(path = %path.display(), %extension, "extension is not an image extension");
        return false;
    }

    let format_lower = format_name.to_ascii_lowercase();
    if !IMAGE_FORMATS.iter().any(|fmt| format_lower.contains(fmt)) {
        debug!(path = %path.display(), format_name, "probed format is not an image format");
        return false;
    }

    true
}

pub fn classify(path: &Path, descriptor: &MediaDescriptor) -> MediaKind {
    if is_image(path, &descriptor.format_name) {
        MediaKind::Image
    } else {
        MediaKind::Video
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_matches() {
        assert!(is_image(Path::new("a.png"), "png"));
        assert!(is_image(Path::new("photo.JPG"), "image2"));
        assert!(is_image(Path::new("photo.jpeg"), "jpeg_pipe"));
        assert!(is_image(Path::new("shot.heic"), "mov,mp4,m4a,3gp,3g2,mj2,heif"));
    }

    #[test]
    fn test_is_image_rejects_video() {
        assert!(!is_image(Path::new("a.mp4"), "mov,mp4,m4a"));
        assert!(!is_image(Path::new("noext"), "png"));
    }

    #[test]
    fn test_is_image_requires_both() {
        assert!(!is_image(Path::new("a.png"), "mp4"));
        assert!(!is_image(Path::new("a.mov"), "image2"));
    }

    #[test]
    fn test_classify() {
        let video = MediaDescriptor {
            duration_seconds: 12.5,
            format_name: "mov,mp4,m4a,3gp,3g2,mj2".into(),
        };
        assert_eq!(classify(Path::new("clip.mp4"), &video), MediaKind::Video);

        let image = MediaDescriptor {
            duration_seconds: 0.0,
            format_name: "png_pipe".into(),
        };
        assert_eq!(classify(Path::new("pic.png"), &image), MediaKind::Image);
    }
}
