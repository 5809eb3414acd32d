//! Builds every URL this crate fetches, per spec.md §6. Every path is
//! derived with `Url::join` off a stored base, never manual string
//! concatenation.

use crate::plan::DownloadFileSpec;
use crate::series::Series;
use crate::version::Version;
use url::Url;

/// Returns the manifest URL for a language: `{base}jpdict/reader/version-{lang}.json`.
pub fn manifest_url(base_url: &Url, lang: &str) -> Url {
    base_url
        .join(&format!("jpdict/reader/version-{lang}.json"))
        .expect("lang is a validated BCP-47-ish tag and cannot produce an invalid URL")
}

/// Returns the data file URL for a planned download, per the three shapes in
/// spec.md §6.
pub fn data_file_url(base_url: &Url, series: Series, lang: &str, spec: &DownloadFileSpec) -> Url {
    let path = match spec {
        DownloadFileSpec::Patch { version } => {
            format!("reader/{series}/{lang}/{}-patch.jsonl", version)
        }
        DownloadFileSpec::Full {
            version,
            part: Some(part),
        } => format!("reader/{series}/{lang}/{}-{part}.jsonl", version),
        DownloadFileSpec::Full { version, part: None } => {
            format!("reader/{series}/{lang}/{}.jsonl", version)
        }
    };
    base_url
        .join(&path)
        .expect("series/lang/version cannot produce an invalid URL")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn manifest_url_depends_only_on_language() {
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(
            manifest_url(&base, "en").as_str(),
            "https://example.com/jpdict/reader/version-en.json"
        );
    }

    #[test]
    fn monolithic_full_url() {
        let base = Url::parse("https://example.com/").unwrap();
        let spec = DownloadFileSpec::Full {
            version: Version::new(1, 0, 0),
            part: None,
        };
        assert_eq!(
            data_file_url(&base, Series::Kanji, "en", &spec).as_str(),
            "https://example.com/reader/kanji/en/1.0.0.jsonl"
        );
    }

    #[test]
    fn partitioned_full_url() {
        let base = Url::parse("https://example.com/").unwrap();
        let spec = DownloadFileSpec::Full {
            version: Version::new(1, 1, 2),
            part: Some(2),
        };
        assert_eq!(
            data_file_url(&base, Series::Words, "en", &spec).as_str(),
            "https://example.com/reader/words/en/1.1.2-2.jsonl"
        );
    }

    #[test]
    fn patch_file_url() {
        let base = Url::parse("https://example.com/").unwrap();
        let spec = DownloadFileSpec::Patch {
            version: Version::new(1, 1, 1),
        };
        assert_eq!(
            data_file_url(&base, Series::Words, "en", &spec).as_str(),
            "https://example.com/reader/words/en/1.1.1-patch.jsonl"
        );
    }
}
