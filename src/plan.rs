//! The download planner.
//!
//! A pure function from `(current version, latest manifest entry)` to a
//! `DownloadPlan`: a plain data-in/data-out enum matched with `match` rather
//! than a stateful planner object. Nothing here awaits or mutates; this
//! makes plans trivially replayable in tests without a live store, per
//! spec.md §9's "no shared mutation between plan and apply".

use crate::error::PlanError;
use crate::manifest::ManifestEntry;
use crate::version::{CurrentVersion, PartInfo, Version};
use serde::{Deserialize, Serialize};

/// One file the streamer should fetch, in the order it appears in
/// [`DownloadPlan::files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadFileSpec {
    /// A full-snapshot file. `part` is `Some` iff the series is partitioned.
    Full {
        version: Version,
        part: Option<u32>,
    },
    /// A patch file carrying the diff from `version.patch - 1` to
    /// `version.patch`.
    Patch { version: Version },
}

impl DownloadFileSpec {
    pub fn version(&self) -> Version {
        match self {
            DownloadFileSpec::Full { version, .. } => *version,
            DownloadFileSpec::Patch { version } => *version,
        }
    }

    pub fn part(&self) -> Option<u32> {
        match self {
            DownloadFileSpec::Full { part, .. } => *part,
            DownloadFileSpec::Patch { .. } => None,
        }
    }
}

/// Whether applying the plan starts from an empty series (discarding
/// whatever is already stored) or layers patches on top of what's there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    Reset,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub kind: PlanKind,
    pub files: Vec<DownloadFileSpec>,
}

impl DownloadPlan {
    fn reset_for(latest: &ManifestEntry) -> Self {
        let files = match latest.parts {
            Some(parts) if parts > 1 => (1..=parts)
                .map(|part| DownloadFileSpec::Full {
                    version: latest.version,
                    part: Some(part),
                })
                .collect(),
            _ => vec![DownloadFileSpec::Full {
                version: latest.version,
                part: None,
            }],
        };
        Self {
            kind: PlanKind::Reset,
            files,
        }
    }
}

/// Computes the ordered download plan to move a series from `current` (or
/// nothing, if absent) to `latest`. See spec.md §4.4 for the case analysis
/// this implements verbatim.
pub fn plan(
    current: Option<CurrentVersion>,
    latest: &ManifestEntry,
) -> Result<DownloadPlan, PlanError> {
    plan_with_threshold(
        current,
        latest,
        crate::config::DEFAULT_RESUME_PATCH_GAP_THRESHOLD,
    )
}

/// Same as [`plan`] but with an explicit resume-vs-reset patch-gap
/// threshold, so callers (and tests) can override the reference constant of
/// 10 from spec.md §4.4/§9.
pub fn plan_with_threshold(
    current: Option<CurrentVersion>,
    latest: &ManifestEntry,
    resume_patch_gap_threshold: u64,
) -> Result<DownloadPlan, PlanError> {
    if let Some(current) = &current {
        if current.version > latest.version {
            return Err(PlanError::DatabaseTooOld);
        }
    }

    let is_reset = match &current {
        None => true,
        Some(current) => !current.version.same_major_minor(&latest.version),
    };

    if is_reset {
        return Ok(DownloadPlan::reset_for(latest));
    }

    // Safe: `is_reset` is false, so `current` is defined and shares
    // (major, minor) with `latest`.
    let current = current.expect("current is Some when plan is an update");

    if let Some(part_info) = current.part_info {
        return Ok(plan_resume(current.version, part_info, latest, resume_patch_gap_threshold));
    }

    Ok(plan_patches(current.version, latest))
}

fn plan_patches(current_version: Version, latest: &ManifestEntry) -> DownloadPlan {
    let files = ((current_version.patch + 1)..=latest.version.patch)
        .map(|patch| DownloadFileSpec::Patch {
            version: Version::new(latest.version.major, latest.version.minor, patch),
        })
        .collect();
    DownloadPlan {
        kind: PlanKind::Update,
        files,
    }
}

fn plan_resume(
    current_version: Version,
    part_info: PartInfo,
    latest: &ManifestEntry,
    resume_patch_gap_threshold: u64,
) -> DownloadPlan {
    let patch_gap = current_version.patch_gap(&latest.version);

    if part_info.part < part_info.parts && patch_gap <= resume_patch_gap_threshold {
        let mut files: Vec<DownloadFileSpec> = ((part_info.part + 1)..=part_info.parts)
            .map(|part| DownloadFileSpec::Full {
                version: current_version,
                part: Some(part),
            })
            .collect();
        files.extend(plan_patches(current_version, latest).files);
        DownloadPlan {
            kind: PlanKind::Update,
            files,
        }
    } else {
        DownloadPlan::reset_for(latest)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(major: u64, minor: u64, patch: u64, parts: Option<u32>) -> ManifestEntry {
        ManifestEntry {
            version: Version::new(major, minor, patch),
            parts,
            database_version: None,
            date_of_creation: "2024-01-01".to_string(),
        }
    }

    #[test]
    fn no_current_version_is_a_reset() {
        let latest = entry(1, 0, 0, None);
        let result = plan(None, &latest).unwrap();
        assert_eq!(result.kind, PlanKind::Reset);
        assert_eq!(
            result.files,
            vec![DownloadFileSpec::Full {
                version: Version::new(1, 0, 0),
                part: None
            }]
        );
    }

    #[test]
    fn reset_partitioned_emits_parts_in_order() {
        let latest = entry(1, 1, 2, Some(3));
        let result = plan(None, &latest).unwrap();
        assert_eq!(result.kind, PlanKind::Reset);
        assert_eq!(
            result.files,
            vec![
                DownloadFileSpec::Full {
                    version: Version::new(1, 1, 2),
                    part: Some(1)
                },
                DownloadFileSpec::Full {
                    version: Version::new(1, 1, 2),
                    part: Some(2)
                },
                DownloadFileSpec::Full {
                    version: Version::new(1, 1, 2),
                    part: Some(3)
                },
            ]
        );
    }

    #[test]
    fn parts_of_one_is_monolithic() {
        let latest = entry(1, 0, 0, Some(1));
        let result = plan(None, &latest).unwrap();
        assert_eq!(
            result.files,
            vec![DownloadFileSpec::Full {
                version: Version::new(1, 0, 0),
                part: None
            }]
        );
    }

    #[test]
    fn different_major_minor_is_a_reset() {
        let current = CurrentVersion::new(Version::new(1, 0, 5));
        let latest = entry(1, 1, 0, None);
        let result = plan(Some(current), &latest).unwrap();
        assert_eq!(result.kind, PlanKind::Reset);
    }

    #[test]
    fn same_major_minor_is_a_patch_update() {
        let current = CurrentVersion::new(Version::new(1, 1, 0));
        let latest = entry(1, 1, 2, Some(3));
        let result = plan(Some(current), &latest).unwrap();
        assert_eq!(result.kind, PlanKind::Update);
        assert_eq!(
            result.files,
            vec![
                DownloadFileSpec::Patch {
                    version: Version::new(1, 1, 1)
                },
                DownloadFileSpec::Patch {
                    version: Version::new(1, 1, 2)
                },
            ]
        );
    }

    #[test]
    fn identical_versions_produce_an_empty_plan() {
        let current = CurrentVersion::new(Version::new(1, 1, 2));
        let latest = entry(1, 1, 2, None);
        let result = plan(Some(current), &latest).unwrap();
        assert_eq!(result.kind, PlanKind::Update);
        assert!(result.files.is_empty());
    }

    #[test]
    fn stale_current_version_is_database_too_old() {
        let current = CurrentVersion::new(Version::new(1, 1, 5));
        let latest = entry(1, 1, 2, None);
        let err = plan(Some(current), &latest).unwrap_err();
        assert!(matches!(err, PlanError::DatabaseTooOld));
    }

    #[test]
    fn resume_small_patch_gap_finishes_parts_then_patches() {
        let current =
            CurrentVersion::with_part_info(Version::new(1, 1, 0), PartInfo::new(1, 3));
        let latest = entry(1, 1, 2, Some(3));
        let result = plan(Some(current), &latest).unwrap();
        assert_eq!(result.kind, PlanKind::Update);
        assert_eq!(
            result.files,
            vec![
                DownloadFileSpec::Full {
                    version: Version::new(1, 1, 0),
                    part: Some(2)
                },
                DownloadFileSpec::Full {
                    version: Version::new(1, 1, 0),
                    part: Some(3)
                },
                DownloadFileSpec::Patch {
                    version: Version::new(1, 1, 1)
                },
                DownloadFileSpec::Patch {
                    version: Version::new(1, 1, 2)
                },
            ]
        );
    }

    #[test]
    fn resume_large_patch_gap_promotes_to_reset() {
        let current =
            CurrentVersion::with_part_info(Version::new(1, 1, 0), PartInfo::new(1, 3));
        let latest = entry(1, 1, 20, Some(3));
        let result = plan(Some(current), &latest).unwrap();
        assert_eq!(result.kind, PlanKind::Reset);
        assert_eq!(
            result.files,
            vec![
                DownloadFileSpec::Full {
                    version: Version::new(1, 1, 20),
                    part: Some(1)
                },
                DownloadFileSpec::Full {
                    version: Version::new(1, 1, 20),
                    part: Some(2)
                },
                DownloadFileSpec::Full {
                    version: Version::new(1, 1, 20),
                    part: Some(3)
                },
            ]
        );
    }

    #[rstest::rstest]
    #[case(10, PlanKind::Update)]
    #[case(11, PlanKind::Reset)]
    #[case(1, PlanKind::Update)]
    fn resume_patch_gap_threshold_boundary(#[case] latest_patch: u64, #[case] expected: PlanKind) {
        let current =
            CurrentVersion::with_part_info(Version::new(1, 1, 0), PartInfo::new(1, 3));
        let latest = entry(1, 1, latest_patch, Some(3));
        let result = plan(Some(current), &latest).unwrap();
        assert_eq!(result.kind, expected);
    }
}
