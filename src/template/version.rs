//! Three-part template version numbers

use std::fmt;
use std::str::FromStr;

/// `major.minor.patch`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionNumber {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionNumber {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// `None` once the patch number is exhausted
    pub fn next_patch(self) -> Option<Self> {
        Some(Self {
            patch: self.patch.checked_add(1)?,
            ..self
        })
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionNumber {
    type Err = String;

    /// Missing trailing parts count as zero, so `2` and `2.1` are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);
        let mut parts = [0u32; 3];
        for (i, part) in s.split('.').enumerate() {
            if i >= 3 {
                return Err(format!("Invalid version '{}': expected major.minor.patch", s));
            }
            parts[i] = part
                .parse()
                .map_err(|_| format!("Invalid version '{}': '{}' is not a number", s, part))?;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

/// The version string one patch after `current`
pub fn bump_patch(current: &str) -> Result<String, String> {
    let version: VersionNumber = current.parse()?;
    version
        .next_patch()
        .map(|next| next.to_string())
        .ok_or_else(|| format!("Version '{}' has no next patch number", version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_patch() {
        assert_eq!(bump_patch("1.0.0").unwrap(), "1.0.1");
        assert_eq!(bump_patch("2.3.9").unwrap(), "2.3.10");
        assert_eq!(bump_patch("4.1").unwrap(), "4.1.1");
    }

    #[test]
    fn test_bump_patch_at_limit_fails() {
        let last = format!("1.0.{}", u32::MAX);
        assert!(bump_patch(&last).is_err());
        assert_eq!(VersionNumber::new(1, 0, u32::MAX).next_patch(), None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("1.x.0".parse::<VersionNumber>().is_err());
        assert!("1.2.3.4".parse::<VersionNumber>().is_err());
        assert!("".parse::<VersionNumber>().is_err());
    }

    #[test]
    fn test_ordering() {
        let a: VersionNumber = "1.0.9".parse().unwrap();
        let b: VersionNumber = "1.0.10".parse().unwrap();
        assert!(a < b);
    }
}
