//! # Sync Coordinator
//!
//! Drives one end-to-end sync run for a connection profile.
//!
//! ## Overview
//!
//! The `SyncCoordinator` wires the engine components together:
//! - Scans each selected root folder with a [`RecursiveScanner`]
//! - Infers titles and artists with the [`MetadataInferencer`]
//! - Diffs the merged scan against the cache with the [`IncrementalDiffer`]
//! - Persists upserts, deletions and bookkeeping through the repositories
//! - Reports per-folder progress to a [`ProgressSink`] and lifecycle events
//!   to the `EventBus`
//!
//! ## Workflow
//!
//! ### Full Sync
//! 1. Reject the run if another one is active for the same profile
//! 2. Take a configuration snapshot from the `ConfigProvider`
//! 3. No selected folders: clear the profile's cache and stop
//! 4. Scan every selected folder in order, checking for cancellation before
//!    each one; a failing folder is recorded and the next one starts
//! 5. Every folder failed: update the retry queue and fail the run
//! 6. Diff the merged successful scans against the cache
//! 7. Delete stale rows, upsert changed rows, update `last_synced`, the
//!    synced folder set, the retry queue and the directory summaries
//! 8. Emit `Completed` or `PartialFailure`
//!
//! ### Retry Failed Folders
//! Same as a full sync, but only the queued failed folders that are still
//! selected are scanned. With nothing queued, only deselected rows are
//! removed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncCoordinator;
//! use tokio_util::sync::CancellationToken;
//!
//! let coordinator = SyncCoordinator::new(transport, songs, state, config, event_bus);
//! let outcome = coordinator.sync(&profile, CancellationToken::new()).await?;
//! println!("upserted {} songs", outcome.upserted);
//! ```

use crate::{
    differ::{retain_summaries_under, DiffInput, FolderScan, IncrementalDiffer, SyncDiff},
    job::{SyncJobId, SyncOutcome, SyncPhase, SyncRun, SyncStatus},
    lister::RemoteFileLister,
    metadata::MetadataInferencer,
    paths::{is_path_under_any, normalize_folder_path},
    progress::{EventBusProgressSink, FolderProgress, ProgressSink},
    scanner::{RecursiveScanner, VisitedDirectories},
    Result, SyncError,
};
use bridge_traits::{Clock, ConnectionProfile, RemoteTransport, SystemClock};
use core_library::{CachedSong, SongCacheRepository, SyncStateRepository};
use core_runtime::config::{ConfigProvider, SyncEngineConfig};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus, RemovalReason, SyncEvent};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Full,
    RetryFailed,
}

/// Active run tracking
struct ActiveSync {
    job_id: SyncJobId,
    cancellation_token: CancellationToken,
}

/// Removes the profile's active entry when the run ends, however it ends.
struct ActiveSyncGuard<'a> {
    active_syncs: &'a Mutex<HashMap<String, ActiveSync>>,
    profile_id: String,
}

impl Drop for ActiveSyncGuard<'_> {
    fn drop(&mut self) {
        self.active_syncs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.profile_id);
    }
}

/// Folders and bookkeeping a run works from.
struct RunPlan {
    /// Selected root folders, normalized and deduplicated, in order.
    selected: Vec<String>,
    /// Previously failed folders that are still selected.
    queued_failed: Vec<String>,
    /// Folders this run scans, in order.
    planned: Vec<String>,
}

/// Per-folder scan results of one run.
#[derive(Default)]
struct ScanPhase {
    scans: Vec<FolderScan>,
    failed: Vec<String>,
}

impl ScanPhase {
    fn successful_folders(&self) -> Vec<String> {
        self.scans.iter().map(|s| s.folder.clone()).collect()
    }
}

pub struct SyncCoordinator {
    transport: Arc<dyn RemoteTransport>,
    songs: Arc<dyn SongCacheRepository>,
    state: Arc<dyn SyncStateRepository>,
    config_provider: Arc<dyn ConfigProvider>,
    event_bus: EventBus,
    progress: Arc<dyn ProgressSink>,
    clock: Arc<dyn Clock>,
    active_syncs: Mutex<HashMap<String, ActiveSync>>,
}

impl SyncCoordinator {
    /// Create a coordinator that reports progress on `event_bus` and stamps
    /// runs with the system clock.
    pub fn new(
        transport: Arc<dyn RemoteTransport>,
        songs: Arc<dyn SongCacheRepository>,
        state: Arc<dyn SyncStateRepository>,
        config_provider: Arc<dyn ConfigProvider>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            transport,
            songs,
            state,
            config_provider,
            progress: Arc::new(EventBusProgressSink::new(event_bus.clone())),
            event_bus,
            clock: Arc::new(SystemClock),
            active_syncs: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_progress_sink(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Scan every selected folder of `profile` and reconcile the cache.
    ///
    /// # Errors
    ///
    /// - [`SyncError::SyncInProgress`] if a run is already active for the profile
    /// - [`SyncError::AllFoldersFailed`] if no folder could be scanned
    /// - [`SyncError::Cancelled`] if `cancellation_token` fired at a folder boundary
    /// - [`SyncError::Library`] if persisting failed
    #[instrument(skip(self, profile, cancellation_token), fields(profile_id = %profile.id))]
    pub async fn sync(
        &self,
        profile: &ConnectionProfile,
        cancellation_token: CancellationToken,
    ) -> Result<SyncOutcome> {
        self.run(profile, RunMode::Full, cancellation_token).await
    }

    /// Rescan only the folders that failed in earlier runs.
    ///
    /// # Errors
    ///
    /// Same as [`sync`](Self::sync).
    #[instrument(skip(self, profile, cancellation_token), fields(profile_id = %profile.id))]
    pub async fn retry_failed_folders(
        &self,
        profile: &ConnectionProfile,
        cancellation_token: CancellationToken,
    ) -> Result<SyncOutcome> {
        self.run(profile, RunMode::RetryFailed, cancellation_token)
            .await
    }

    pub fn is_syncing(&self, profile_id: &str) -> bool {
        self.lock_active().contains_key(profile_id)
    }

    /// Request cancellation of the profile's active run.
    ///
    /// The run stops before its next folder. Returns the job id of the
    /// cancelled run, if any.
    pub fn cancel_sync(&self, profile_id: &str) -> Option<SyncJobId> {
        let active = self.lock_active();
        active.get(profile_id).map(|sync| {
            sync.cancellation_token.cancel();
            sync.job_id
        })
    }

    /// Drop every cached song and all bookkeeping of a profile, e.g. when the
    /// profile itself is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SyncInProgress`] while a run is active.
    #[instrument(skip(self))]
    pub async fn clear_profile(&self, profile_id: &str) -> Result<u64> {
        let _guard = self.register(profile_id, SyncJobId::new(), CancellationToken::new())?;

        let deleted = self.songs.delete_all_entries(profile_id).await?;
        self.state.clear_profile(profile_id).await?;
        info!(deleted, "Cleared profile cache");

        self.event_bus
            .emit(CoreEvent::Cache(CacheEvent::Cleared {
                profile_id: profile_id.to_string(),
            }))
            .ok();
        Ok(deleted)
    }

    // ------------------------------------------------------------------------
    // Run
    // ------------------------------------------------------------------------

    async fn run(
        &self,
        profile: &ConnectionProfile,
        mode: RunMode,
        cancellation_token: CancellationToken,
    ) -> Result<SyncOutcome> {
        let mut run = SyncRun::new(
            &profile.id,
            mode == RunMode::RetryFailed,
            self.clock.unix_timestamp_millis(),
        );
        let _guard = self.register(&profile.id, run.id, cancellation_token.clone())?;
        let config = self.config_provider.engine_config();

        let plan = self.plan(profile, mode).await?;
        info!(
            job_id = %run.id,
            selected = plan.selected.len(),
            planned = plan.planned.len(),
            retry_failed_only = run.retry_failed_only,
            "Starting sync"
        );

        if plan.selected.is_empty() && mode == RunMode::Full {
            return self.clear_unselected_profile(&mut run).await;
        }

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                job_id: run.id.to_string(),
                profile_id: profile.id.clone(),
                folders: plan.planned.clone(),
                retry_failed_only: run.retry_failed_only,
            }))
            .ok();

        let existing = self.songs.get_cached_entries(&profile.id).await?;

        if plan.planned.is_empty() {
            debug!("No failed folders queued for retry");
            return self
                .finish_without_scan(&mut run, &plan, &existing, config.delete_batch_size)
                .await;
        }

        let scanned = self
            .scan_folders(&mut run, profile, &plan, &config, &cancellation_token)
            .await?;

        if scanned.scans.is_empty() {
            return self
                .fail_all_folders(&mut run, &plan, &existing, scanned, config.delete_batch_size)
                .await;
        }

        run.transition(SyncPhase::Diffing)?;
        let previous_summaries = self.state.directory_summaries(&profile.id).await?;
        let diff = IncrementalDiffer::diff(DiffInput {
            existing: &existing,
            selected_folders: &plan.selected,
            scans: &scanned.scans,
            failed_folders: &scanned.failed,
            previous_summaries: &previous_summaries,
        });
        debug!(
            upserts = diff.upserts.len(),
            unchanged = diff.unchanged,
            stale_by_selection = diff.stale_by_selection.len(),
            stale_by_absence = diff.stale_by_absence.len(),
            "Computed diff"
        );

        let now = self.clock.unix_timestamp_millis();
        let songs = build_songs(&profile.id, &diff, &config, now);

        run.transition(SyncPhase::Persisting)?;
        let persisted = self
            .persist(
                &profile.id,
                &plan,
                &scanned,
                &diff,
                previous_summaries,
                &songs,
                &config,
                now,
            )
            .await;
        let (deleted_by_selection, deleted_by_absence) = match persisted {
            Ok(counts) => counts,
            Err(e) => {
                run.transition(SyncPhase::Failed)?;
                self.emit_failed(&run, &e, false);
                return Err(e);
            }
        };

        let status = if scanned.failed.is_empty() {
            run.transition(SyncPhase::Done)?;
            SyncStatus::Completed
        } else {
            run.transition(SyncPhase::PartialFailure)?;
            warn!(failed_folders = ?scanned.failed, "Sync partially completed");
            SyncStatus::PartialFailure
        };

        let outcome = SyncOutcome {
            job_id: run.id,
            profile_id: profile.id.clone(),
            upserted: songs.len(),
            unchanged: diff.unchanged,
            deleted_by_selection,
            deleted_by_absence,
            failed_folders: scanned.failed,
            status,
            duration_ms: self.elapsed_ms(&run),
        };
        self.emit_outcome(&outcome);

        info!(
            job_id = %run.id,
            upserted = outcome.upserted,
            unchanged = outcome.unchanged,
            deleted_by_selection,
            deleted_by_absence,
            "Sync finished"
        );
        Ok(outcome)
    }

    async fn plan(&self, profile: &ConnectionProfile, mode: RunMode) -> Result<RunPlan> {
        let mut seen = HashSet::new();
        let selected: Vec<String> = profile
            .root_folders
            .iter()
            .map(|folder| normalize_folder_path(folder))
            .filter(|folder| seen.insert(folder.clone()))
            .collect();

        let queued: HashSet<String> = self
            .state
            .failed_folders(&profile.id)
            .await?
            .iter()
            .map(|folder| normalize_folder_path(folder))
            .collect();
        let queued_failed: Vec<String> = selected
            .iter()
            .filter(|folder| queued.contains(*folder))
            .cloned()
            .collect();

        let planned = match mode {
            RunMode::Full => selected.clone(),
            RunMode::RetryFailed => queued_failed.clone(),
        };

        Ok(RunPlan {
            selected,
            queued_failed,
            planned,
        })
    }

    /// Scan every planned folder in order. Directories are listed at most
    /// once per run, even when two selected folders overlap.
    async fn scan_folders(
        &self,
        run: &mut SyncRun,
        profile: &ConnectionProfile,
        plan: &RunPlan,
        config: &SyncEngineConfig,
        cancellation_token: &CancellationToken,
    ) -> Result<ScanPhase> {
        let lister = Arc::new(RemoteFileLister::new(
            Arc::clone(&self.transport),
            config.retry.clone(),
        ));
        let scanner = RecursiveScanner::new(lister, config.scan.clone());
        let visited = VisitedDirectories::new();

        let total = plan.planned.len();
        let mut phase = ScanPhase::default();
        let mut synced_songs = 0;

        for (index, folder) in plan.planned.iter().enumerate() {
            if cancellation_token.is_cancelled() {
                info!(folders_completed = index, "Sync cancelled");
                run.transition(SyncPhase::Cancelled)?;
                self.emit_cancelled(run, index);
                return Err(SyncError::Cancelled);
            }
            run.transition(SyncPhase::Scanning {
                folder: index + 1,
                total,
            })?;

            let failed = match scanner.scan(profile, folder, &visited).await {
                Ok(result) => {
                    synced_songs += result.len();
                    info!(
                        folder = %folder,
                        audio_files = result.len(),
                        covers = result.covers().len(),
                        "Folder scanned"
                    );
                    phase.scans.push(FolderScan::new(folder, result));
                    false
                }
                Err(e) => {
                    error!(folder = %folder, error = %e, "Failed to scan folder");
                    phase.failed.push(folder.clone());
                    true
                }
            };

            self.progress.folder_completed(&FolderProgress {
                profile_id: profile.id.clone(),
                completed: index + 1,
                total,
                folder: folder.clone(),
                synced_songs,
                failed,
            });
        }

        Ok(phase)
    }

    /// Write the diff and the run's bookkeeping. Returns the deletion counts
    /// by selection and by absence.
    #[allow(clippy::too_many_arguments)]
    async fn persist(
        &self,
        profile_id: &str,
        plan: &RunPlan,
        scanned: &ScanPhase,
        diff: &SyncDiff,
        previous_summaries: HashMap<String, String>,
        songs: &[CachedSong],
        config: &SyncEngineConfig,
        now: i64,
    ) -> Result<(usize, usize)> {
        let batch_size = config.delete_batch_size;
        let deleted_by_selection = self
            .delete_paths(
                profile_id,
                &diff.stale_by_selection,
                RemovalReason::Deselected,
                batch_size,
            )
            .await?;
        let deleted_by_absence = self
            .delete_paths(
                profile_id,
                &diff.stale_by_absence,
                RemovalReason::RemoteAbsent,
                batch_size,
            )
            .await?;

        if !songs.is_empty() {
            self.songs.upsert_entries(songs).await?;
            self.event_bus
                .emit(CoreEvent::Cache(CacheEvent::SongsUpserted {
                    profile_id: profile_id.to_string(),
                    count: songs.len(),
                }))
                .ok();
        }

        self.state.update_last_synced(profile_id, now).await?;

        let synced: Vec<String> = plan
            .selected
            .iter()
            .filter(|folder| !scanned.failed.contains(*folder))
            .cloned()
            .collect();
        self.state.replace_synced_folders(profile_id, &synced).await?;

        let queue = next_failed_queue(
            &plan.queued_failed,
            &scanned.successful_folders(),
            &scanned.failed,
        );
        self.state
            .replace_failed_folders(profile_id, &queue, now)
            .await?;

        let summaries = next_directory_summaries(
            previous_summaries,
            &plan.selected,
            &scanned.successful_folders(),
            &synced,
            &diff.directory_summaries,
        );
        self.state
            .replace_directory_summaries(profile_id, &summaries)
            .await?;

        Ok((deleted_by_selection, deleted_by_absence))
    }

    /// Delete `paths` in batches of `batch_size`, taken from the run's
    /// configuration snapshot.
    async fn delete_paths(
        &self,
        profile_id: &str,
        paths: &[String],
        reason: RemovalReason,
        batch_size: usize,
    ) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }
        let mut deleted = 0;
        for batch in paths.chunks(batch_size.max(1)) {
            deleted += self.songs.delete_entries_by_path(profile_id, batch).await? as usize;
        }
        debug!(deleted, ?reason, batch_size, "Removed cached songs");

        self.event_bus
            .emit(CoreEvent::Cache(CacheEvent::SongsRemoved {
                profile_id: profile_id.to_string(),
                count: deleted,
                reason,
            }))
            .ok();
        Ok(deleted)
    }

    /// Nothing selected: the whole cache of the profile goes.
    async fn clear_unselected_profile(&self, run: &mut SyncRun) -> Result<SyncOutcome> {
        run.transition(SyncPhase::Persisting)?;
        let profile_id = run.profile_id.clone();
        let now = self.clock.unix_timestamp_millis();

        let deleted = self.songs.delete_all_entries(&profile_id).await? as usize;
        self.state.clear_profile(&profile_id).await?;
        self.state.update_last_synced(&profile_id, now).await?;
        run.transition(SyncPhase::Done)?;

        info!(deleted, "No folders selected, cleared cached songs");
        self.event_bus
            .emit(CoreEvent::Cache(CacheEvent::Cleared {
                profile_id: profile_id.clone(),
            }))
            .ok();

        let outcome = SyncOutcome {
            job_id: run.id,
            profile_id,
            upserted: 0,
            unchanged: 0,
            deleted_by_selection: deleted,
            deleted_by_absence: 0,
            failed_folders: Vec::new(),
            status: SyncStatus::Completed,
            duration_ms: self.elapsed_ms(run),
        };
        self.emit_outcome(&outcome);
        Ok(outcome)
    }

    /// Retry run with an empty queue: only deselected rows are removed.
    async fn finish_without_scan(
        &self,
        run: &mut SyncRun,
        plan: &RunPlan,
        existing: &[CachedSong],
        batch_size: usize,
    ) -> Result<SyncOutcome> {
        run.transition(SyncPhase::Persisting)?;
        let stale = IncrementalDiffer::stale_by_selection(existing, &plan.selected);
        let deleted = self
            .delete_paths(&run.profile_id, &stale, RemovalReason::Deselected, batch_size)
            .await?;
        run.transition(SyncPhase::Done)?;

        let outcome = SyncOutcome {
            job_id: run.id,
            profile_id: run.profile_id.clone(),
            upserted: 0,
            unchanged: 0,
            deleted_by_selection: deleted,
            deleted_by_absence: 0,
            failed_folders: Vec::new(),
            status: SyncStatus::Completed,
            duration_ms: self.elapsed_ms(run),
        };
        self.emit_outcome(&outcome);
        Ok(outcome)
    }

    /// Every planned folder failed. Deselected rows are still removed and the
    /// retry queue is updated; nothing under the scanned roots changes.
    async fn fail_all_folders(
        &self,
        run: &mut SyncRun,
        plan: &RunPlan,
        existing: &[CachedSong],
        scanned: ScanPhase,
        batch_size: usize,
    ) -> Result<SyncOutcome> {
        let stale = IncrementalDiffer::stale_by_selection(existing, &plan.selected);
        self.delete_paths(&run.profile_id, &stale, RemovalReason::Deselected, batch_size)
            .await?;

        let queue = next_failed_queue(&plan.queued_failed, &[], &scanned.failed);
        self.state
            .replace_failed_folders(&run.profile_id, &queue, self.clock.unix_timestamp_millis())
            .await?;

        run.transition(SyncPhase::Failed)?;
        let error = SyncError::AllFoldersFailed {
            failed: scanned.failed,
        };
        error!(error = %error, "Sync failed");
        self.emit_failed(run, &error, true);
        Err(error)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn register(
        &self,
        profile_id: &str,
        job_id: SyncJobId,
        cancellation_token: CancellationToken,
    ) -> Result<ActiveSyncGuard<'_>> {
        let mut active = self.lock_active();
        if active.contains_key(profile_id) {
            return Err(SyncError::SyncInProgress {
                profile_id: profile_id.to_string(),
            });
        }
        active.insert(
            profile_id.to_string(),
            ActiveSync {
                job_id,
                cancellation_token,
            },
        );

        Ok(ActiveSyncGuard {
            active_syncs: &self.active_syncs,
            profile_id: profile_id.to_string(),
        })
    }

    fn lock_active(&self) -> MutexGuard<'_, HashMap<String, ActiveSync>> {
        self.active_syncs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn elapsed_ms(&self, run: &SyncRun) -> u64 {
        let elapsed = self.clock.unix_timestamp_millis() - run.started_at;
        u64::try_from(elapsed).unwrap_or(0)
    }

    fn emit_outcome(&self, outcome: &SyncOutcome) {
        let event = match outcome.status {
            SyncStatus::Completed => SyncEvent::Completed {
                job_id: outcome.job_id.to_string(),
                profile_id: outcome.profile_id.clone(),
                upserted: outcome.upserted,
                deleted_by_selection: outcome.deleted_by_selection,
                deleted_by_absence: outcome.deleted_by_absence,
                duration_ms: outcome.duration_ms,
            },
            SyncStatus::PartialFailure => SyncEvent::PartialFailure {
                job_id: outcome.job_id.to_string(),
                profile_id: outcome.profile_id.clone(),
                upserted: outcome.upserted,
                failed_folders: outcome.failed_folders.clone(),
            },
        };
        self.event_bus.emit(CoreEvent::Sync(event)).ok();
    }

    fn emit_failed(&self, run: &SyncRun, error: &SyncError, recoverable: bool) {
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Failed {
                job_id: run.id.to_string(),
                profile_id: run.profile_id.clone(),
                message: error.to_string(),
                recoverable,
            }))
            .ok();
    }

    fn emit_cancelled(&self, run: &SyncRun, folders_completed: usize) {
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Cancelled {
                job_id: run.id.to_string(),
                profile_id: run.profile_id.clone(),
                folders_completed,
            }))
            .ok();
    }
}

/// Infer metadata over the merged scan and build the rows to write.
fn build_songs(
    profile_id: &str,
    diff: &SyncDiff,
    config: &SyncEngineConfig,
    now: i64,
) -> Vec<CachedSong> {
    if diff.upserts.is_empty() {
        return Vec::new();
    }
    let inferencer = MetadataInferencer::new(&diff.merged_files, config.inference.clone());

    diff.upserts
        .iter()
        .cloned()
        .map(|pending| {
            let parsed = inferencer.infer(&pending.file);
            pending.into_song(profile_id, Some(&parsed), now)
        })
        .collect()
}

/// `(queued - succeeded) ∪ failed`, in first-seen order.
fn next_failed_queue(queued: &[String], succeeded: &[String], failed: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    queued
        .iter()
        .filter(|folder| !succeeded.contains(*folder))
        .chain(failed.iter())
        .filter(|folder| seen.insert((*folder).clone()))
        .cloned()
        .collect()
}

/// Carry over summaries of folders that were not rescanned, replace those of
/// rescanned folders, and keep only what lies under a synced folder.
fn next_directory_summaries(
    previous: HashMap<String, String>,
    selected: &[String],
    rescanned: &[String],
    synced: &[String],
    current: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut next: HashMap<String, String> = previous
        .into_iter()
        .filter(|(directory, _)| is_path_under_any(directory, selected))
        .filter(|(directory, _)| !is_path_under_any(directory, rescanned))
        .collect();
    next.extend(current.iter().map(|(k, v)| (k.clone(), v.clone())));
    retain_summaries_under(&mut next, synced);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::PendingUpsert;
    use bridge_traits::RemoteEntry;

    fn folders(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_build_songs_infers_from_whole_merged_scan() {
        let merged: Vec<RemoteEntry> = [
            "/Queen/Hits/Queen - Bohemian Rhapsody.mp3",
            "/Queen/Hits/Queen - Radio Ga Ga.mp3",
            "/Queen/Hits/Freddie - Love of My Life.mp3",
        ]
        .iter()
        .map(|path| RemoteEntry::file(*path, 1))
        .collect();
        let changed = merged[2].clone();

        let diff = SyncDiff {
            upserts: vec![PendingUpsert {
                file: changed,
                existing: None,
                content_type: "audio/mpeg".to_string(),
                last_modified: 0,
                cover_art_path: None,
                fingerprint: "f".to_string(),
                track_number: 3,
            }],
            merged_files: merged,
            ..SyncDiff::default()
        };

        let songs = build_songs("p1", &diff, &SyncEngineConfig::default(), 10);

        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].artist, "Freddie");
        assert_eq!(songs[0].title, "Love of My Life");
        assert_eq!(songs[0].updated_at, 10);
    }

    #[test]
    fn test_build_songs_without_upserts_is_empty() {
        let songs = build_songs("p1", &SyncDiff::default(), &SyncEngineConfig::default(), 10);
        assert!(songs.is_empty());
    }

    #[test]
    fn test_failed_queue_drops_recovered_folders() {
        let queue = next_failed_queue(
            &folders(&["/Podcasts", "/Audiobooks"]),
            &folders(&["/Podcasts"]),
            &folders(&["/Live", "/Audiobooks"]),
        );
        assert_eq!(queue, folders(&["/Audiobooks", "/Live"]));
    }

    #[test]
    fn test_directory_summaries_are_rebuilt_for_rescanned_folders() {
        let mut previous = HashMap::new();
        previous.insert("/Music/Old".to_string(), "a".to_string());
        previous.insert("/Podcasts/Show".to_string(), "b".to_string());
        previous.insert("/Deselected".to_string(), "c".to_string());

        let mut current = HashMap::new();
        current.insert("/Music/New".to_string(), "d".to_string());

        let next = next_directory_summaries(
            previous,
            &folders(&["/Music", "/Podcasts"]),
            &folders(&["/Music"]),
            &folders(&["/Music", "/Podcasts"]),
            &current,
        );

        assert_eq!(next.len(), 2);
        assert_eq!(next.get("/Music/New").map(String::as_str), Some("d"));
        assert_eq!(next.get("/Podcasts/Show").map(String::as_str), Some("b"));
    }

    #[test]
    fn test_directory_summaries_of_failed_folders_are_dropped() {
        let mut previous = HashMap::new();
        previous.insert("/Podcasts/Show".to_string(), "b".to_string());

        let next = next_directory_summaries(
            previous,
            &folders(&["/Music", "/Podcasts"]),
            &folders(&["/Music"]),
            &folders(&["/Music"]),
            &HashMap::new(),
        );
        assert!(next.is_empty());
    }
}
