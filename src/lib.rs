#![warn(missing_docs)]

//! `jpdict_sync` keeps a locally cached copy of remote Japanese dictionary
//! data series (words, kanji, radicals, names) synchronised with a
//! server-published version, using snapshot and incremental-patch files.
//!
//! The pipeline, leaves first:
//!
//! - [`fetch`] and [`fetch::lines`]: a cancellable, timed-out HTTP GET turned
//!   into a lazy sequence of parsed JSON lines.
//! - [`manifest`]: resolves and caches the server-published version for a
//!   (series, major version, language).
//! - [`plan`]: a pure function from current + latest version to an ordered
//!   list of files to fetch.
//! - [`stream`]: fetches and frames each planned file into a typed event
//!   sequence.
//! - [`records`]: validates a raw JSON record against its series' schema.
//! - [`driver`]: [`driver::update`] is the crate's main entry point; it owns
//!   the event loop tying the above together and writing through [`store`].

pub mod config;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod plan;
pub mod records;
pub mod reporter;
pub mod series;
pub mod store;
pub mod stream;
pub mod urls;
pub mod version;
