//! Client version compatibility.
//!
//! Every attachment carries the sender's readable version (`major.minor[.patch]`). The
//! receiver checks it against its supported range before decoding the payload.

use crate::error::DispatchError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ClientVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `major.minor` or `major.minor.patch`
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parse_component(parts.next()?)?;
        let patch = match parts.next() {
            Some(part) => parse_component(part)?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }
}

fn parse_component(part: &str) -> Option<u32> {
    // Reject signs and whitespace that `parse` would otherwise tolerate
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

impl fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Inclusive range of supported client versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    min: ClientVersion,
    max: ClientVersion,
}

impl VersionRange {
    pub fn new(min: ClientVersion, max: ClientVersion) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, version: ClientVersion) -> bool {
        self.min <= version && version <= self.max
    }

    /// Accept `readable` if it parses and lies within the range
    pub fn check(&self, readable: &str) -> Result<ClientVersion, DispatchError> {
        match ClientVersion::parse(readable) {
            Some(version) if self.contains(version) => Ok(version),
            Some(version) => Err(DispatchError::IncompatibleVersion(format!(
                "{version} is outside {}..={}",
                self.min, self.max
            ))),
            None => Err(DispatchError::IncompatibleVersion(format!(
                "unreadable version '{}'",
                readable.escape_debug()
            ))),
        }
    }
}
