//! Pieces shared by the quality and bitrate searches: one encode attempt
//! (`Trial`), the loop's result (`SearchOutcome`), and the last-resort fallback.

use crate::error::{CompressError, Result};
use crate::media::MediaKind;
use crate::scratch;
use crate::size::{Fit, ToleranceBand};
use std::fmt;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Within the primary band.
    Accepted(u64),
    /// Only the last trial fit, and only inside the relaxed band.
    DegradedAccepted(u64),
    /// Nothing usable; carries the size of the last trial, if one ran.
    Exhausted(Option<u64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    AlreadySmall,
    Accepted,
    DegradedAccepted,
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Completion::AlreadySmall => "input already within target, no search needed",
            Completion::Accepted => "within tolerance",
            Completion::DegradedAccepted => "close enough (relaxed tolerance)",
        })
    }
}

impl SearchOutcome {
    pub fn into_completion(self, kind: MediaKind, target: u64) -> Result<Completion> {
        match self {
            SearchOutcome::Accepted(_) => Ok(Completion::Accepted),
            SearchOutcome::DegradedAccepted(_) => Ok(Completion::DegradedAccepted),
            SearchOutcome::Exhausted(last_size) => Err(CompressError::Convergence {
                kind,
                target,
                last_size,
            }),
        }
    }
}

/// One encode attempt. Dropping it deletes the scratch file.
#[derive(Debug)]
pub struct Trial<P> {
    pub parameter: P,
    pub size: u64,
    scratch: NamedTempFile,
}

impl<P: fmt::Display> Trial<P> {
    pub fn measure(parameter: P, scratch: NamedTempFile) -> Result<Self> {
        let size = scratch::file_size(scratch.path())?;
        Ok(Self {
            parameter,
            size,
            scratch,
        })
    }

    pub fn accept(self, output: &Path) -> Result<u64> {
        let size = self.size;
        scratch::persist(self.scratch, output)?;
        Ok(size)
    }

    pub fn discard(self) {
        scratch::discard(self.scratch);
    }
}

/// Applies the relaxed band to the final trial once the loop gives up.
pub fn conclude<P: fmt::Display>(
    kind: MediaKind,
    last: Option<Trial<P>>,
    band: ToleranceBand,
    output: &Path,
) -> Result<SearchOutcome> {
    let Some(trial) = last else {
        return Ok(SearchOutcome::Exhausted(None));
    };
    match band.fit(trial.size) {
        Fit::Primary | Fit::Relaxed => {
            let parameter = trial.parameter.to_string();
            let size = trial.accept(output)?;
            warn!(
                %kind,
                size,
                target_bytes = band.target(),
                %parameter,
                "compression close enough, accepting last attempt"
            );
            Ok(SearchOutcome::DegradedAccepted(size))
        }
        Fit::Outside => {
            let size = trial.size;
            info!(
                %kind,
                size,
                target_bytes = band.target(),
                "last attempt outside relaxed tolerance"
            );
            trial.discard();
            Ok(SearchOutcome::Exhausted(Some(size)))
        }
    }
}
