//! Lenient kernel version parsing and comparison.
//!
//! Kernel trees report versions like `5.19.1`, `5.6`, or `6.1.0-rc3`; user
//! scripts compare against literals like `ver("5.6")`. Both sides normalize
//! to a three-component [`semver::Version`] with missing components as zero
//! and trailing tags dropped.

use std::fmt;

use semver::Version;

/// A normalized kernel version, ordered numerically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KernelVersion(Version);

impl KernelVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> KernelVersion {
        KernelVersion(Version::new(major, minor, patch))
    }

    /// Parse `major[.minor[.patch]]`, ignoring anything after the numeric
    /// core (`-rc3`, `-gentoo`, ...). Returns `None` when the major part is
    /// missing or non-numeric.
    pub fn parse(raw: &str) -> Option<KernelVersion> {
        let core: String = raw
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let mut parts = core.split('.').filter(|p| !p.is_empty());
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        Some(KernelVersion::new(major, minor, patch))
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0.major, self.0.minor, self.0.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_version() {
        assert_eq!(KernelVersion::parse("5.19.1"), Some(KernelVersion::new(5, 19, 1)));
    }

    #[test]
    fn parse_pads_missing_components() {
        assert_eq!(KernelVersion::parse("5.6"), Some(KernelVersion::new(5, 6, 0)));
        assert_eq!(KernelVersion::parse("6"), Some(KernelVersion::new(6, 0, 0)));
    }

    #[test]
    fn parse_drops_suffix() {
        assert_eq!(
            KernelVersion::parse("6.1.0-rc3"),
            Some(KernelVersion::new(6, 1, 0))
        );
        assert_eq!(
            KernelVersion::parse("5.15.0-gentoo-dist"),
            Some(KernelVersion::new(5, 15, 0))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(KernelVersion::parse(""), None);
        assert_eq!(KernelVersion::parse("linux"), None);
    }

    #[test]
    fn ordering_is_numeric() {
        let old = KernelVersion::parse("4.9").unwrap();
        let new = KernelVersion::parse("4.10").unwrap();
        assert!(old < new);
        assert!(KernelVersion::parse("5.4").unwrap() < KernelVersion::new(5, 6, 0));
    }
}
