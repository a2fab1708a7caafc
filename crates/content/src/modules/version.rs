//! Module version numbers.

use std::fmt;
use std::str::FromStr;

use crate::error::VersionError;

/// A `major.minor.patch` version declared by a module.
///
/// Missing trailing components default to zero, so `"2"` and `"2.0"` both
/// parse as `2.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModuleVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModuleVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for ModuleVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut parts = [0u32; 3];
        for (i, component) in trimmed.split('.').enumerate() {
            if i >= parts.len() {
                return Err(VersionError::TooManyComponents(s.to_string()));
            }
            parts[i] = component
                .parse()
                .map_err(|_| VersionError::InvalidComponent {
                    version: s.to_string(),
                    component: component.to_string(),
                })?;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
