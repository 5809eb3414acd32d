//! Version numbers and partitioned-download bookkeeping shared by every
//! component. See SPEC_FULL.md's Data Model section for the invariants
//! these types encode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A three-component version number, ordered lexicographically.
///
/// `major` must be `>= 1`; this is enforced by [`manifest`](crate::manifest)
/// parsing, not by this type, so that a `Version` can still represent values
/// read from a trusted on-disk row without re-validating them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether `self` and `other` share the same (major, minor) pair, i.e.
    /// whether moving from `self` to `other` can be done with patches alone
    /// rather than a full reset.
    pub fn same_major_minor(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor
    }

    /// `other.patch - self.patch`, assuming `same_major_minor`. Panics (via
    /// overflow) if `other.patch < self.patch`; callers only call this after
    /// establishing `self <= other`.
    pub fn patch_gap(&self, other: &Version) -> u64 {
        other.patch - self.patch
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Position of one file within a partitioned full snapshot.
///
/// `1 <= part <= parts` is an invariant maintained by every constructor in
/// this crate; nothing here re-checks it on access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInfo {
    pub part: u32,
    pub parts: u32,
}

impl PartInfo {
    pub fn new(part: u32, parts: u32) -> Self {
        Self { part, parts }
    }

    pub fn is_final(&self) -> bool {
        self.part == self.parts
    }
}

/// What the caller already has on disk for a series, or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentVersion {
    pub version: Version,
    pub part_info: Option<PartInfo>,
}

impl CurrentVersion {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            part_info: None,
        }
    }

    pub fn with_part_info(version: Version, part_info: PartInfo) -> Self {
        Self {
            version,
            part_info: Some(part_info),
        }
    }
}
