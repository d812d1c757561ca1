//! CUDA driver versions as reported by `cuDriverGetVersion`.
//!
//! The driver encodes `major.minor` as `1000 * major + 10 * minor`, so CUDA
//! 11.2 is `11020`. Ordering on the raw value is ordering on versions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Installed driver capability level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverVersion(i32);

impl DriverVersion {
    /// Version reported when the driver cannot be queried at all.
    pub const NONE: DriverVersion = DriverVersion(0);

    /// For constants. Untrusted input goes through [`DriverVersion::checked_new`].
    #[must_use]
    pub const fn new(major: i32, minor: i32) -> Self {
        Self(1000 * major + 10 * minor)
    }

    /// `None` when the encoding does not fit in the driver's `int`.
    #[must_use]
    pub const fn checked_new(major: i32, minor: i32) -> Option<Self> {
        let Some(major) = major.checked_mul(1000) else {
            return None;
        };
        let Some(minor) = minor.checked_mul(10) else {
            return None;
        };
        match major.checked_add(minor) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Wrap a raw value as returned by the driver.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn major(self) -> i32 {
        self.0 / 1000
    }

    #[must_use]
    pub const fn minor(self) -> i32 {
        (self.0 % 1000) / 10
    }

    /// The gate predicate: `self >= min`.
    #[must_use]
    pub const fn satisfies(self, min: DriverVersion) -> bool {
        self.0 >= min.0
    }
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// Failure to parse a `major.minor` driver version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid driver version `{0}` (expected MAJOR.MINOR or a raw integer)")]
pub struct ParseVersionError(pub String);

impl FromStr for DriverVersion {
    type Err = ParseVersionError;

    /// Accepts `11.2`, `11` or the raw encoding `11020`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || ParseVersionError(s.to_string());
        match trimmed.split_once('.') {
            Some((major, minor)) => {
                let major: i32 = major.parse().map_err(|_| err())?;
                let minor: i32 = minor.parse().map_err(|_| err())?;
                if !(0..100).contains(&minor) || major < 0 {
                    return Err(err());
                }
                Self::checked_new(major, minor).ok_or_else(err)
            }
            None => {
                let value: i32 = trimmed.parse().map_err(|_| err())?;
                if value < 0 {
                    Err(err())
                } else if value < 1000 {
                    Ok(Self::new(value, 0))
                } else {
                    Ok(Self::from_raw(value))
                }
            }
        }
    }
}
