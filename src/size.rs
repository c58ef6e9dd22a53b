use crate::error::{CompressError, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * 1024;

/// Primary acceptance band, as a fraction of the target.
pub const PRIMARY_TOLERANCE: f64 = 0.10;
/// Last-resort band applied to the final trial only.
pub const RELAXED_TOLERANCE: f64 = PRIMARY_TOLERANCE * 1.5;
/// Inputs at or below `target * (1 + PRIMARY_TOLERANCE)` skip the search.
pub const ALREADY_SMALL_FACTOR: f64 = 1.0 + PRIMARY_TOLERANCE;

static TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)(KB|MB)$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetSize(u64);

impl TargetSize {
    pub fn from_bytes(bytes: u64) -> Option<Self> {
        (bytes > 0).then_some(Self(bytes))
    }

    pub fn bytes(self) -> u64 {
        self.0
    }

    pub fn band(self) -> ToleranceBand {
        ToleranceBand::new(self)
    }

    /// True when an input of `input_bytes` is close enough that no search is needed.
    pub fn is_already_met_by(self, input_bytes: u64) -> bool {
        input_bytes as f64 <= self.0 as f64 * ALREADY_SMALL_FACTOR
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes ({})", self.0, human_bytes(self.0))
    }
}

pub fn parse_target_size(raw: &str) -> Result<TargetSize> {
    let invalid = || CompressError::InvalidTargetSize(raw.to_string());
    let caps = TARGET_RE.captures(raw.trim()).ok_or_else(invalid)?;
    let amount: u64 = caps[1].parse().map_err(|_| invalid())?;
    let unit = if caps[2].eq_ignore_ascii_case("KB") {
        KIB
    } else {
        MIB
    };
    amount
        .checked_mul(unit)
        .and_then(TargetSize::from_bytes)
        .ok_or_else(invalid)
}

/// clap `value_parser` adapter.
pub fn validate_target_size(raw: &str) -> Result<TargetSize, String> {
    parse_target_size(raw).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    Primary,
    Relaxed,
    Outside,
}

#[derive(Debug, Clone, Copy)]
pub struct ToleranceBand {
    target: u64,
}

impl ToleranceBand {
    pub fn new(target: TargetSize) -> Self {
        Self {
            target: target.bytes(),
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn fit(&self, size: u64) -> Fit {
        let diff = size.abs_diff(self.target) as f64;
        let target = self.target as f64;
        if diff <= target * PRIMARY_TOLERANCE {
            Fit::Primary
        } else if diff <= target * RELAXED_TOLERANCE {
            Fit::Relaxed
        } else {
            Fit::Outside
        }
    }

    pub fn is_too_large(&self, size: u64) -> bool {
        size > self.target
    }
}

pub fn human_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_target_size("500KB").unwrap().bytes(), 512_000);
        assert_eq!(parse_target_size("2MB").unwrap().bytes(), 2_097_152);
        assert_eq!(parse_target_size("1kb").unwrap().bytes(), 1024);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(
            parse_target_size("2mb").unwrap(),
            parse_target_size("2MB").unwrap()
        );
        assert_eq!(
            parse_target_size("2Mb").unwrap(),
            parse_target_size("2MB").unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["2GB", "", "MB", "1.5MB", "-2MB", "2 MB", "0KB", "99999999999999999999MB"] {
            assert!(
                matches!(
                    parse_target_size(raw),
                    Err(CompressError::InvalidTargetSize(_))
                ),
                "expected rejection for {raw:?}"
            );
        }
    }

    #[test]
    fn test_parse_overflow_rejected() {
        let raw = format!("{}MB", u64::MAX / 1024);
        assert!(parse_target_size(&raw).is_err());
    }

    #[test]
    fn test_band_edges() {
        let band = TargetSize::from_bytes(1000).unwrap().band();
        assert_eq!(band.fit(1000), Fit::Primary);
        assert_eq!(band.fit(900), Fit::Primary);
        assert_eq!(band.fit(1100), Fit::Primary);
        assert_eq!(band.fit(1101), Fit::Relaxed);
        assert_eq!(band.fit(850), Fit::Relaxed);
        assert_eq!(band.fit(1150), Fit::Relaxed);
        assert_eq!(band.fit(849), Fit::Outside);
        assert_eq!(band.fit(1151), Fit::Outside);
    }

    #[test]
    fn test_already_small() {
        let target = TargetSize::from_bytes(1000).unwrap();
        assert!(target.is_already_met_by(1100));
        assert!(target.is_already_met_by(10));
        assert!(!target.is_already_met_by(1101));
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1536), "1.5 KB");
        assert_eq!(human_bytes(2 * MIB), "2.00 MB");
    }
}
