//! The per-file streamer and the plan-level event framing around it.
//!
//! A sequential "fetch, then interpret metadata, then interpret body"
//! control flow, generalised from one file to a sequence of planned files.
//! Rather than a generic state-machine type, the per-file phases are
//! matched inline in a loop with sequential `match`/`?` rather than an
//! abstract FSM.
//!
//! The event stream is built with `futures::stream::unfold` rather than a
//! hand-written `Stream` impl or an extra `async-stream`-style dependency:
//! `unfold` is the idiomatic way to turn "a chunk of async state-stepping
//! code" into a `Stream` without writing a manual `Future`/`Stream` poll
//! loop.

use crate::config::SyncConfig;
use crate::error::StreamError;
use crate::fetch::lines::LineReader;
use crate::plan::{DownloadFileSpec, DownloadPlan};
use crate::series::Series;
use crate::urls::data_file_url;
use crate::version::Version;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Whether a data file is a full snapshot or a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Full,
    Patch,
}

/// The parsed first line of every data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: Version,
    pub part: Option<u32>,
    pub format: Format,
    pub records: u64,
}

/// What a record's `_` field (if any) means for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    Add,
    Change,
    Delete,
}

/// Events observable by the plan-level caller (the driver), per spec.md §4.5/§4.7:
/// one `Reset` (only when the planner promoted a resume into a reset) before
/// one `DownloadStart`, then per file one `FileStart`, zero or more
/// `Record`s, one `FileEnd`, and finally one `DownloadEnd`.
#[derive(Debug, Clone)]
pub enum PlanEvent {
    Reset,
    DownloadStart { total_files: usize },
    FileStart {
        spec: DownloadFileSpec,
        header: FileHeader,
    },
    Record {
        spec: DownloadFileSpec,
        mode: RecordMode,
        record: Value,
    },
    FileEnd { spec: DownloadFileSpec },
    DownloadEnd,
}

type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

enum Phase {
    Reset,
    DownloadStart,
    NextFile(usize),
    InFile(usize, Box<LineReader<ByteStream>>),
    DownloadEnd,
    Done,
}

struct Ctx {
    client: reqwest::Client,
    base_url: url::Url,
    series: Series,
    lang: String,
    config_timeout: std::time::Duration,
    cancel: CancellationToken,
}

struct State {
    ctx: Ctx,
    files: Vec<DownloadFileSpec>,
    phase: Phase,
}

/// Drives `plan` to completion, yielding the event sequence spec.md §4.5/§9
/// describes. `reset_before` is `true` only when the planner promoted a
/// resumed partitioned download into a full reset (the ">10 patches" case in
/// spec.md §4.4): it is what decides whether a `Reset` event precedes
/// `DownloadStart`.
pub fn stream_plan(
    client: reqwest::Client,
    config: &SyncConfig,
    series: Series,
    lang: String,
    plan: DownloadPlan,
    reset_before: bool,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<PlanEvent, StreamError>> {
    let ctx = Ctx {
        client,
        base_url: config.base_url.clone(),
        series,
        lang,
        config_timeout: config.request_timeout,
        cancel,
    };
    let initial = State {
        ctx,
        files: plan.files,
        phase: if reset_before {
            Phase::Reset
        } else {
            Phase::DownloadStart
        },
    };

    stream::unfold(initial, step)
}

async fn step(mut state: State) -> Option<(Result<PlanEvent, StreamError>, State)> {
    loop {
        match std::mem::replace(&mut state.phase, Phase::Done) {
            Phase::Reset => {
                state.phase = Phase::DownloadStart;
                return Some((Ok(PlanEvent::Reset), state));
            }
            Phase::DownloadStart => {
                let total_files = state.files.len();
                state.phase = Phase::NextFile(0);
                return Some((Ok(PlanEvent::DownloadStart { total_files }), state));
            }
            Phase::NextFile(index) => {
                if index >= state.files.len() {
                    state.phase = Phase::DownloadEnd;
                    continue;
                }
                let spec = state.files[index];
                match open_file(&state.ctx, spec).await {
                    Ok((reader, header)) => {
                        state.phase = Phase::InFile(index, Box::new(reader));
                        return Some((Ok(PlanEvent::FileStart { spec, header }), state));
                    }
                    Err(err) => {
                        state.phase = Phase::Done;
                        return Some((Err(err), state));
                    }
                }
            }
            Phase::InFile(index, mut reader) => {
                let spec = state.files[index];
                match reader.next_record(&state.ctx.cancel).await {
                    None => {
                        state.phase = Phase::NextFile(index + 1);
                        return Some((Ok(PlanEvent::FileEnd { spec }), state));
                    }
                    Some(Err(err)) => {
                        state.phase = Phase::Done;
                        return Some((Err(StreamError::InvalidJson(err)), state));
                    }
                    Some(Ok(value)) => {
                        if is_header(&value) {
                            state.phase = Phase::Done;
                            return Some((Err(StreamError::HeaderDuplicate { spec }), state));
                        }
                        match interpret_record(spec, &value) {
                            Ok((mode, record)) => {
                                state.phase = Phase::InFile(index, reader);
                                return Some((Ok(PlanEvent::Record { spec, mode, record }), state));
                            }
                            Err(err) => {
                                state.phase = Phase::Done;
                                return Some((Err(err), state));
                            }
                        }
                    }
                }
            }
            Phase::DownloadEnd => {
                state.phase = Phase::Done;
                return Some((Ok(PlanEvent::DownloadEnd), state));
            }
            Phase::Done => return None,
        }
    }
}

async fn open_file(
    ctx: &Ctx,
    spec: DownloadFileSpec,
) -> Result<(LineReader<ByteStream>, FileHeader), StreamError> {
    let url = data_file_url(&ctx.base_url, ctx.series, &ctx.lang, &spec);
    let byte_stream = crate::fetch::fetch(&ctx.client, url, ctx.config_timeout, &ctx.cancel)
        .await?
        .boxed();
    let mut reader = LineReader::new(byte_stream, ctx.config_timeout);

    let first = reader
        .next_record(&ctx.cancel)
        .await
        .ok_or(StreamError::HeaderMissing { spec })?
        .map_err(StreamError::InvalidJson)?;

    if !is_header(&first) {
        return Err(StreamError::HeaderMissing { spec });
    }

    let header = parse_header(&first, spec)?;
    Ok((reader, header))
}

fn is_header(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some("header")
}

fn parse_header(value: &Value, spec: DownloadFileSpec) -> Result<FileHeader, StreamError> {
    let version_obj = value.get("version").ok_or_else(|| StreamError::VersionMismatch {
        spec,
        reason: "header is missing `version`".to_string(),
    })?;
    let major = require_u64(version_obj, "major", spec)?;
    let minor = require_u64(version_obj, "minor", spec)?;
    let patch = require_u64(version_obj, "patch", spec)?;
    let version = Version::new(major, minor, patch);

    let part = value.get("part").and_then(Value::as_u64).map(|p| p as u32);

    let format = match value.get("format").and_then(Value::as_str) {
        Some("full") => Format::Full,
        Some("patch") => Format::Patch,
        _ => {
            return Err(StreamError::VersionMismatch {
                spec,
                reason: "header `format` must be \"full\" or \"patch\"".to_string(),
            })
        }
    };

    let records = value
        .get("records")
        .and_then(Value::as_u64)
        .ok_or_else(|| StreamError::VersionMismatch {
            spec,
            reason: "header is missing `records`".to_string(),
        })?;

    let header = FileHeader {
        version,
        part,
        format,
        records,
    };

    validate_header(&header, spec)?;
    Ok(header)
}

fn require_u64(value: &Value, field: &'static str, spec: DownloadFileSpec) -> Result<u64, StreamError> {
    value
        .get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| StreamError::VersionMismatch {
            spec,
            reason: format!("header `version.{field}` is missing or not an integer"),
        })
}

fn validate_header(header: &FileHeader, spec: DownloadFileSpec) -> Result<(), StreamError> {
    if header.version != spec.version() {
        return Err(StreamError::VersionMismatch {
            spec,
            reason: format!(
                "header version {} does not match expected {}",
                header.version,
                spec.version()
            ),
        });
    }
    if header.part != spec.part() {
        return Err(StreamError::VersionMismatch {
            spec,
            reason: format!(
                "header part {:?} does not match expected {:?}",
                header.part,
                spec.part()
            ),
        });
    }
    let expected_format = match spec {
        DownloadFileSpec::Full { .. } => Format::Full,
        DownloadFileSpec::Patch { .. } => Format::Patch,
    };
    if header.format != expected_format {
        return Err(StreamError::VersionMismatch {
            spec,
            reason: "header format does not match the expected file kind".to_string(),
        });
    }
    Ok(())
}

fn interpret_record(
    spec: DownloadFileSpec,
    value: &Value,
) -> Result<(RecordMode, Value), StreamError> {
    match spec {
        DownloadFileSpec::Full { .. } => {
            let Value::Object(obj) = value else {
                return Err(StreamError::InvalidRecord {
                    spec,
                    reason: "record in a full file must be a JSON object".to_string(),
                });
            };
            if obj.contains_key("_") {
                return Err(StreamError::InvalidRecord {
                    spec,
                    reason: "record in a full file must not contain `_`".to_string(),
                });
            }
            Ok((RecordMode::Add, value.clone()))
        }
        DownloadFileSpec::Patch { .. } => {
            let Value::Object(obj) = value else {
                return Err(StreamError::InvalidRecord {
                    spec,
                    reason: "record in a patch file must be a JSON object".to_string(),
                });
            };
            let mode = match obj.get("_").and_then(Value::as_str) {
                Some("+") => RecordMode::Add,
                Some("~") => RecordMode::Change,
                Some("-") => RecordMode::Delete,
                _ => {
                    return Err(StreamError::InvalidRecord {
                        spec,
                        reason: "record in a patch file must have `_` in {+, ~, -}".to_string(),
                    })
                }
            };
            let mut rest = obj.clone();
            rest.remove("_");
            Ok((mode, Value::Object(rest)))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SyncConfig;
    use serde_json::json;

    fn cfg() -> SyncConfig {
        SyncConfig::new(url::Url::parse("http://example.invalid/").unwrap())
    }

    #[test]
    fn header_detection() {
        assert!(is_header(&json!({"type": "header"})));
        assert!(!is_header(&json!({"id": 1})));
        assert!(!is_header(&json!([1, 2, 3])));
    }

    #[test]
    fn full_record_rejects_underscore_field() {
        let spec = DownloadFileSpec::Full {
            version: Version::new(1, 0, 0),
            part: None,
        };
        let err = interpret_record(spec, &json!({"id": 1, "_": "+"})).unwrap_err();
        assert!(matches!(err, StreamError::InvalidRecord { .. }));
    }

    #[test]
    fn full_record_rejects_non_object() {
        let spec = DownloadFileSpec::Full {
            version: Version::new(1, 0, 0),
            part: None,
        };
        let err = interpret_record(spec, &json!([1, 2])).unwrap_err();
        assert!(matches!(err, StreamError::InvalidRecord { .. }));
    }

    #[test]
    fn patch_record_maps_discriminator() {
        let spec = DownloadFileSpec::Patch {
            version: Version::new(1, 1, 1),
        };
        let (mode, record) = interpret_record(spec, &json!({"_": "~", "id": 5})).unwrap();
        assert!(matches!(mode, RecordMode::Change));
        assert_eq!(record, json!({"id": 5}));
    }

    #[test]
    fn patch_record_requires_known_discriminator() {
        let spec = DownloadFileSpec::Patch {
            version: Version::new(1, 1, 1),
        };
        let err = interpret_record(spec, &json!({"_": "?", "id": 5})).unwrap_err();
        assert!(matches!(err, StreamError::InvalidRecord { .. }));
    }

    #[test]
    fn header_validates_against_expected_spec() {
        let spec = DownloadFileSpec::Full {
            version: Version::new(1, 0, 0),
            part: None,
        };
        let header = FileHeader {
            version: Version::new(1, 1, 0),
            part: None,
            format: Format::Full,
            records: 0,
        };
        let err = validate_header(&header, spec).unwrap_err();
        assert!(matches!(err, StreamError::VersionMismatch { .. }));
    }

    #[tokio::test]
    async fn empty_files_plan_emits_only_framing_events() {
        let plan = DownloadPlan {
            kind: crate::plan::PlanKind::Update,
            files: vec![],
        };
        let events: Vec<_> = stream_plan(
            reqwest::Client::new(),
            &cfg(),
            Series::Kanji,
            "en".to_string(),
            plan,
            false,
            CancellationToken::new(),
        )
        .collect()
        .await;
        let events: Result<Vec<_>, _> = events.into_iter().collect();
        let events = events.unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PlanEvent::DownloadStart { total_files: 0 }));
        assert!(matches!(events[1], PlanEvent::DownloadEnd));
    }
}
