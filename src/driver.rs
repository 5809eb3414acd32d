//! The update driver. Owns the event loop: invoke the planner, iterate the
//! streamer's events, validate and batch records into the store, commit
//! version rows, and emit progress/lifecycle callbacks through a
//! [`SyncReporter`].
//!
//! A plain "fetch, interpret, commit" sequence generalised from one file to
//! a whole multi-file plan, tracked with a handful of local counters rather
//! than a stateful object graph.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::manifest::{self, ManifestCache};
use crate::plan::{self, DownloadFileSpec, PlanKind};
use crate::records;
use crate::reporter::SyncReporter;
use crate::series::Series;
use crate::store::{DataVersionRow, RecordUpdate, SeriesStore};
use crate::stream::{self, PlanEvent, RecordMode};
use crate::version::{CurrentVersion, PartInfo};
use futures::{pin_mut, StreamExt};
use tokio_util::sync::CancellationToken;

/// Arguments to [`update`].
pub struct UpdateParams {
    pub series: Series,
    pub major_version: u64,
    pub lang: String,
    /// What's already on disk for `series`, or `None` if it's empty locally.
    pub current_version: Option<CurrentVersion>,
    /// Bypasses the manifest cache for this call.
    pub force_fetch: bool,
}

/// Brings `series` up to date with the server-published version, per
/// spec.md §4.7's five-step procedure. Returns once the whole plan has been
/// applied, or fails without leaving a partial version row for the file that
/// was in flight.
#[tracing::instrument(skip_all, fields(series = %params.series, lang = %params.lang))]
pub async fn update(
    client: &reqwest::Client,
    cache: &ManifestCache,
    config: &SyncConfig,
    store: &dyn SeriesStore,
    reporter: Option<&dyn SyncReporter>,
    params: UpdateParams,
    cancel: &CancellationToken,
) -> Result<(), SyncError> {
    if params.current_version.is_none() {
        store.clear_series(params.series)?;
    }

    let latest = manifest::get_version_info(
        client,
        cache,
        &config.base_url,
        params.series,
        params.major_version,
        &params.lang,
        config.request_timeout,
        params.force_fetch,
        cancel,
    )
    .await?;

    let plan = plan::plan_with_threshold(
        params.current_version,
        &latest,
        config.resume_patch_gap_threshold,
    )?;

    // spec.md §4.5: a `reset` event is emitted only when the planner
    // promoted a resumed partitioned download into a fresh reset, not for a
    // plain "nothing stored yet" or major/minor-bump reset.
    let reset_before = matches!(
        params.current_version,
        Some(CurrentVersion { part_info: Some(_), .. })
    ) && plan.kind == PlanKind::Reset;

    let total_files = plan.files.len();
    tracing::info!(files = total_files, kind = ?plan.kind, "resolved download plan");

    let events = stream::stream_plan(
        client.clone(),
        config,
        params.series,
        params.lang.clone(),
        plan,
        reset_before,
        cancel.clone(),
    );
    pin_mut!(events);

    let series = params.series;
    let mut current_file = 0usize;
    let mut current_file_spec: Option<DownloadFileSpec> = None;
    let mut current_record = 0u64;
    let mut total_records_in_file = 0u64;
    let mut last_reported_total_progress = 0.0f64;
    let mut batch: Vec<RecordUpdate> = Vec::with_capacity(config.batch_size);

    while let Some(event) = events.next().await {
        if cancel.is_cancelled() {
            return Err(SyncError::Aborted);
        }
        let event = event?;

        match event {
            PlanEvent::Reset => {
                if let Some(reporter) = reporter {
                    reporter.on_reset(series);
                }
                store.clear_series(series)?;
            }
            PlanEvent::DownloadStart { .. } => {
                if let Some(reporter) = reporter {
                    reporter.on_update_start(series);
                }
                last_reported_total_progress = 0.0;
            }
            PlanEvent::FileStart { spec, header } => {
                current_file += 1;
                current_record = 0;
                total_records_in_file = header.records;
                current_file_spec = Some(spec);
                if let Some(reporter) = reporter {
                    reporter.on_file_start(series, header.version);
                }
                // The initial fileProgress=0 event for this file; emitted right
                // after filestart rather than bundled into downloadstart.
                let total_progress = total_progress(current_file, total_files, 0.0);
                last_reported_total_progress = total_progress;
                if let Some(reporter) = reporter {
                    reporter.on_progress(series, 0.0, total_progress);
                }
            }
            PlanEvent::Record { mode, record, .. } => {
                let validated = match mode {
                    RecordMode::Delete => records::validate_delete(series, &record)
                        .map(|key| RecordUpdate { key, mode, value: None }),
                    RecordMode::Add | RecordMode::Change => {
                        records::validate_add_or_change(series, &record).and_then(|()| {
                            records::extract_key(series, &record).map(|key| RecordUpdate {
                                key,
                                mode,
                                value: Some(record.clone()),
                            })
                        })
                    }
                };

                match validated {
                    Ok(update) => {
                        batch.push(update);
                        if batch.len() >= config.batch_size {
                            if cancel.is_cancelled() {
                                return Err(SyncError::Aborted);
                            }
                            store.update_series(series, &batch)?;
                            batch.clear();
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping invalid record");
                        if let Some(reporter) = reporter {
                            reporter.on_parse_error(series, &err, &record);
                        }
                    }
                }

                current_record += 1;
                let file_progress = if total_records_in_file > 0 {
                    (current_record as f64 / total_records_in_file as f64).min(1.0)
                } else {
                    1.0
                };
                let total_progress = total_progress(current_file, total_files, file_progress);
                if total_progress - last_reported_total_progress > config.progress_epsilon {
                    if let Some(reporter) = reporter {
                        reporter.on_progress(series, file_progress, total_progress);
                    }
                    last_reported_total_progress = total_progress;
                }
            }
            PlanEvent::FileEnd { spec } => {
                if cancel.is_cancelled() {
                    return Err(SyncError::Aborted);
                }
                if !batch.is_empty() {
                    store.update_series(series, &batch)?;
                    batch.clear();
                }

                let row = DataVersionRow {
                    version: spec.version(),
                    part_info: part_info_after_file(&spec, latest.parts),
                    lang: params.lang.clone(),
                    database_version: latest.database_version.clone(),
                    date_of_creation: latest.date_of_creation.clone(),
                };
                store.update_data_version(series, &row)?;

                let total_progress = total_progress(current_file, total_files, 1.0);
                last_reported_total_progress = total_progress;
                if let Some(reporter) = reporter {
                    reporter.on_progress(series, 1.0, total_progress);
                    reporter.on_file_end(series);
                }
                current_file_spec = None;
            }
            PlanEvent::DownloadEnd => {
                if let Some(reporter) = reporter {
                    reporter.on_update_end(series);
                }
            }
        }
    }

    debug_assert!(current_file_spec.is_none(), "stream ended mid-file");
    Ok(())
}

fn total_progress(current_file: usize, total_files: usize, file_progress: f64) -> f64 {
    if total_files == 0 {
        return 1.0;
    }
    ((current_file.saturating_sub(1)) as f64 + file_progress) / total_files as f64
}

/// Computes the version row's `part_info` after applying one file, per
/// spec.md §3's invariant: present only while mid-partitioned-initial-
/// download, dropped once the final part's `fileend` has been applied.
fn part_info_after_file(spec: &DownloadFileSpec, manifest_parts: Option<u32>) -> Option<PartInfo> {
    match spec {
        DownloadFileSpec::Full { part: Some(part), .. } => {
            let parts = manifest_parts.unwrap_or(*part);
            if *part >= parts {
                None
            } else {
                Some(PartInfo::new(*part, parts))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::version::Version;

    #[test]
    fn total_progress_is_zero_before_any_file() {
        assert_eq!(total_progress(0, 3, 0.0), 0.0);
    }

    #[test]
    fn total_progress_reaches_one_at_final_file_end() {
        assert_eq!(total_progress(3, 3, 1.0), 1.0);
    }

    #[test]
    fn total_progress_with_no_files_is_complete() {
        assert_eq!(total_progress(0, 0, 0.0), 1.0);
    }

    #[test]
    fn part_info_dropped_on_final_part() {
        let spec = DownloadFileSpec::Full {
            version: Version::new(1, 1, 2),
            part: Some(3),
        };
        assert_eq!(part_info_after_file(&spec, Some(3)), None);
    }

    #[test]
    fn part_info_kept_on_non_final_part() {
        let spec = DownloadFileSpec::Full {
            version: Version::new(1, 1, 2),
            part: Some(2),
        };
        assert_eq!(
            part_info_after_file(&spec, Some(3)),
            Some(PartInfo::new(2, 3))
        );
    }

    #[test]
    fn part_info_absent_for_monolithic_and_patch_files() {
        let full = DownloadFileSpec::Full {
            version: Version::new(1, 0, 0),
            part: None,
        };
        assert_eq!(part_info_after_file(&full, None), None);

        let patch = DownloadFileSpec::Patch {
            version: Version::new(1, 1, 1),
        };
        assert_eq!(part_info_after_file(&patch, Some(3)), None);
    }
}
