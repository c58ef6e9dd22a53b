use crate::error::{CompressError, Result};
use std::ffi::OsString;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

pub const IMAGE_SCRATCH_SUFFIX: &str = ".temp.jpg";
pub const VIDEO_SCRATCH_SUFFIX: &str = ".temp.mp4";

/// Suffixes ffmpeg appends to a `-passlogfile` prefix during two-pass x264 runs.
const PASSLOG_SUFFIXES: &[&str] = &[
    "-0.log",
    "-0.log.mbtree",
    "-0.log.temp",
    "-0.log.mbtree.temp",
];

pub fn output_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Creates the output directory if needed and proves it is writable.
pub fn ensure_output_dir(output: &Path) -> Result<PathBuf> {
    let dir = output_dir(output);
    let access_err = |source| CompressError::DirectoryAccess {
        dir: dir.clone(),
        source,
    };
    fs::create_dir_all(&dir).map_err(access_err)?;
    Builder::new()
        .prefix(".write-check")
        .tempfile_in(&dir)
        .map_err(access_err)?;
    Ok(dir)
}

/// A per-run unique scratch file next to `output`, deleted on drop unless persisted.
///
/// On unix it gets the mode a plain `File::create` would (0o666 less the umask).
pub fn scratch_for(output: &Path, suffix: &str) -> Result<NamedTempFile> {
    let dir = output_dir(output);
    let mut prefix = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    prefix.push(".");
    let mut builder = Builder::new();
    builder.prefix(&prefix).suffix(suffix);
    #[cfg(unix)]
    builder.permissions(fs::Permissions::from_mode(0o666));
    builder
        .tempfile_in(&dir)
        .map_err(|e| CompressError::io("failed to create scratch file in", dir, e))
}

/// Whether `output` already resolves to the same file as `input`.
pub fn is_same_file(input: &Path, output: &Path) -> bool {
    match (fs::canonicalize(input), fs::canonicalize(output)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

pub fn file_size(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| CompressError::io("failed to read size of", path, e))
}

/// Moves an accepted scratch file into place, replacing any existing output.
pub fn persist(scratch: NamedTempFile, output: &Path) -> Result<()> {
    scratch
        .persist(output)
        .map(drop)
        .map_err(|e| CompressError::io("failed to move scratch file to", output, e.error))
}

pub fn discard(scratch: NamedTempFile) {
    let path = scratch.path().to_path_buf();
    if let Err(err) = scratch.close() {
        warn!(path = %path.display(), %err, "failed to remove scratch file");
    }
}

/// Owns the side files of a two-pass encode; removes them on drop.
#[derive(Debug)]
pub struct PassLog {
    prefix: PathBuf,
}

impl PassLog {
    pub fn for_scratch(scratch: &Path) -> Self {
        let mut prefix = scratch.as_os_str().to_owned();
        prefix.push(".passlog");
        Self {
            prefix: PathBuf::from(prefix),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn side_files(&self) -> Vec<PathBuf> {
        PASSLOG_SUFFIXES
            .iter()
            .map(|suffix| {
                let mut p = self.prefix.as_os_str().to_owned();
                p.push(suffix);
                PathBuf::from(p)
            })
            .collect()
    }
}

impl Drop for PassLog {
    fn drop(&mut self) {
        for file in self.side_files() {
            match fs::remove_file(&file) {
                Ok(()) => debug!(path = %file.display(), "removed pass log"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => warn!(path = %file.display(), %err, "failed to remove pass log"),
            }
        }
    }
}

/// Lists leftover scratch artifacts in `dir`.
#[cfg(test)]
pub fn leftovers(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            let name = p.file_name().unwrap().to_string_lossy().into_owned();
            name.ends_with(IMAGE_SCRATCH_SUFFIX)
                || name.ends_with(VIDEO_SCRATCH_SUFFIX)
                || name.contains(".passlog")
                || name.starts_with(".write-check")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_of_bare_name() {
        assert_eq!(output_dir(Path::new("out.jpg")), PathBuf::from("."));
        assert_eq!(output_dir(Path::new("a/b/out.jpg")), PathBuf::from("a/b"));
    }

    #[test]
    fn test_ensure_output_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("x/y/out.jpg");
        let dir = ensure_output_dir(&output).unwrap();
        assert!(dir.is_dir());
        assert!(leftovers(&dir).is_empty());
        // idempotent
        ensure_output_dir(&output).unwrap();
    }

    #[test]
    fn test_ensure_output_dir_rejects_file_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let err = ensure_output_dir(&blocker.join("out.jpg")).unwrap_err();
        assert!(matches!(err, CompressError::DirectoryAccess { .. }));
    }

    #[test]
    fn test_is_same_file_through_dot_segments() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in.mp4");
        fs::write(&input, b"x").unwrap();
        assert!(is_same_file(&input, &tmp.path().join(".").join("in.mp4")));
        assert!(!is_same_file(&input, &tmp.path().join("out.mp4")));
    }

    #[test]
    fn test_scratch_naming_and_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("out.mp4");
        let scratch = scratch_for(&output, VIDEO_SCRATCH_SUFFIX).unwrap();
        let name = scratch.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("out.mp4."));
        assert!(name.ends_with(VIDEO_SCRATCH_SUFFIX));
        drop(scratch);
        assert!(leftovers(tmp.path()).is_empty());
    }

    #[test]
    fn test_persist_replaces_output() {
        let tmp = tempfile::tempdir().unwrap();
        let output = tmp.path().join("out.jpg");
        fs::write(&output, b"old").unwrap();
        let scratch = scratch_for(&output, IMAGE_SCRATCH_SUFFIX).unwrap();
        fs::write(scratch.path(), b"fresh").unwrap();
        persist(scratch, &output).unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"fresh");
        assert!(leftovers(tmp.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_persisted_output_has_default_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let plain = tmp.path().join("plain.jpg");
        fs::write(&plain, b"x").unwrap();
        let output = tmp.path().join("out.jpg");
        let scratch = scratch_for(&output, IMAGE_SCRATCH_SUFFIX).unwrap();
        persist(scratch, &output).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&output), mode(&plain));
    }

    #[test]
    fn test_passlog_drop_removes_side_files() {
        let tmp = tempfile::tempdir().unwrap();
        let log = PassLog::for_scratch(&tmp.path().join("out.mp4.abc.temp.mp4"));
        for f in log.side_files().iter().take(2) {
            fs::write(f, b"stats").unwrap();
        }
        drop(log);
        assert!(leftovers(tmp.path()).is_empty());
    }
}
