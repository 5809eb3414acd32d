//! The four dictionary series this crate knows how to synchronise.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One of the four logically separable dictionary tables.
///
/// `strum`'s `Display`/`EnumString` give us the manifest-key and URL-segment
/// spelling (`words`, `kanji`, `names`, `radicals`) for free, the same way the
/// teacher leans on derived enum traits (e.g. `RepoDataVariant`) rather than
/// hand-written `match` boilerplate for simple string round-trips.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Series {
    Words,
    Kanji,
    Names,
    Radicals,
}

/// The series-specific primary key type a record carries.
///
/// Words and names key on a numeric id, kanji keys on a codepoint-sized
/// integer, radicals key on a short string. Collapsed into one enum so the
/// driver and store can move keys around without matching on `Series` a
/// second time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesKey {
    Id(u32),
    Codepoint(u32),
    Str(String),
}
