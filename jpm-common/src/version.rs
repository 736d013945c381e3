use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JpmError;

/// A `major.minor.patch` module version. Totally ordered lexicographically
/// by `(major, minor, patch)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// How two versions relate. Any difference in the major component is an
/// incompatibility regardless of sign; minor/patch differences are ordinary
/// ordering results. This classification, not just the ordering, drives
/// resolver conflict policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRelation {
    MajorIncompatible,
    Greater,
    Less,
    Equal,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn relation(&self, other: &Version) -> VersionRelation {
        if self.major != other.major {
            return VersionRelation::MajorIncompatible;
        }
        match (self.minor, self.patch).cmp(&(other.minor, other.patch)) {
            Ordering::Greater => VersionRelation::Greater,
            Ordering::Less => VersionRelation::Less,
            Ordering::Equal => VersionRelation::Equal,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn parse_field(text: &str, full: &str) -> Result<u64, JpmError> {
    // u64::from_str tolerates a leading '+'; the descriptor format does not.
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(JpmError::MalformedVersion(full.to_string()));
    }
    text.parse::<u64>()
        .map_err(|_| JpmError::MalformedVersion(full.to_string()))
}

impl FromStr for Version {
    type Err = JpmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split('.');
        let (major, minor, patch) = match (fields.next(), fields.next(), fields.next()) {
            (Some(a), Some(b), Some(c)) if fields.next().is_none() => (a, b, c),
            _ => return Err(JpmError::MalformedVersion(s.to_string())),
        };
        Ok(Version {
            major: parse_field(major, s)?,
            minor: parse_field(minor, s)?,
            patch: parse_field(patch, s)?,
        })
    }
}
