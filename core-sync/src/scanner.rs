//! # Recursive Scanner
//!
//! Walks a remote directory tree from one root folder and collects audio
//! files plus the first cover image found in each directory.
//!
//! ## Concurrency
//!
//! Sibling subtrees are scanned concurrently. A single semaphore per root scan
//! bounds how many listings are in flight across the whole tree; a permit is
//! held only for the duration of one listing, never across recursion. Each
//! branch builds its own [`ScanResult`] and hands it back to its parent for
//! merging.
//!
//! ## Visited directories
//!
//! A [`VisitedDirectories`] set lives for a whole sync run and is shared by
//! every root scan of that run, so a directory reachable from two selected
//! roots is listed once. A root that an earlier root already covered scans
//! to an empty result.
//!
//! ## Failure handling
//!
//! - A failing subtree is logged and contributes nothing; its siblings
//!   continue. Its path is released so a later root may list it again.
//! - Directories deeper than `max_depth` are skipped with a warning.
//! - A retryable failure of the root listing triggers one serial rescan of the
//!   same root with a single permit. A failed attempt releases every path it
//!   marked as visited.

use crate::lister::RemoteFileLister;
use crate::paths::{extension_of, file_base_name, normalize_folder_path, parent_folder_path};
use crate::{Result, SyncError};
use bridge_traits::{ConnectionProfile, RemoteEntry};
use core_runtime::config::ScanSettings;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, instrument, warn};

/// Audio files and cover images discovered under one root.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    audio_files: Vec<RemoteEntry>,
    covers: HashMap<String, String>,
    seen: HashSet<String>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an audio file unless its path was already recorded.
    pub fn push_audio(&mut self, entry: RemoteEntry) -> bool {
        if !self.seen.insert(entry.path.clone()) {
            return false;
        }
        self.audio_files.push(entry);
        true
    }

    /// Record the cover image of `directory` unless one is already known.
    pub fn record_cover(&mut self, directory: &str, cover_path: &str) {
        self.covers
            .entry(normalize_folder_path(directory))
            .or_insert_with(|| cover_path.to_string());
    }

    /// Append `other`, keeping entries already present.
    pub fn merge(&mut self, other: ScanResult) {
        for entry in other.audio_files {
            self.push_audio(entry);
        }
        for (directory, cover) in other.covers {
            self.covers.entry(directory).or_insert(cover);
        }
    }

    pub fn audio_files(&self) -> &[RemoteEntry] {
        &self.audio_files
    }

    /// Directory path to cover image path.
    pub fn covers(&self) -> &HashMap<String, String> {
        &self.covers
    }

    pub fn cover_for(&self, directory: &str) -> Option<&str> {
        self.covers
            .get(&normalize_folder_path(directory))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.audio_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio_files.is_empty()
    }
}

/// Directories listed during one sync run.
#[derive(Debug, Default)]
pub struct VisitedDirectories {
    paths: Mutex<HashSet<String>>,
}

impl VisitedDirectories {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.paths
            .lock()
            .await
            .contains(&normalize_folder_path(path))
    }

    pub async fn is_empty(&self) -> bool {
        self.paths.lock().await.is_empty()
    }

    /// Returns `false` when `path` was already visited.
    async fn insert(&self, path: &str) -> bool {
        self.paths.lock().await.insert(path.to_string())
    }

    async fn remove_all(&self, paths: &[String]) {
        let mut visited = self.paths.lock().await;
        for path in paths {
            visited.remove(path);
        }
    }
}

/// State shared by every branch of one root scan attempt.
struct ScanContext<'a> {
    permits: Semaphore,
    visited: &'a VisitedDirectories,
    /// Paths this attempt added to `visited`.
    marked: Mutex<Vec<String>>,
}

impl<'a> ScanContext<'a> {
    fn new(permits: usize, visited: &'a VisitedDirectories) -> Self {
        Self {
            permits: Semaphore::new(permits.max(1)),
            visited,
            marked: Mutex::new(Vec::new()),
        }
    }

    /// Returns `false` when `path` was already visited in this run.
    async fn mark_visited(&self, path: &str) -> bool {
        if !self.visited.insert(path).await {
            return false;
        }
        self.marked.lock().await.push(path.to_string());
        true
    }

    async fn release(&self, path: &str) {
        self.visited.remove_all(&[path.to_string()]).await;
        self.marked.lock().await.retain(|marked| marked != path);
    }

    /// Forget every path this attempt marked.
    async fn rollback(&self) {
        let marked = std::mem::take(&mut *self.marked.lock().await);
        self.visited.remove_all(&marked).await;
    }
}

pub struct RecursiveScanner {
    lister: Arc<RemoteFileLister>,
    settings: ScanSettings,
}

impl RecursiveScanner {
    pub fn new(lister: Arc<RemoteFileLister>, settings: ScanSettings) -> Self {
        Self { lister, settings }
    }

    /// Scan the tree below `root`, skipping directories already in
    /// `visited`.
    ///
    /// A root that is already in `visited` yields an empty result.
    ///
    /// # Errors
    ///
    /// Only a failure to list the root itself is returned; subtree failures
    /// are isolated. When the parallel scan fails with a retryable error the
    /// root is rescanned serially before giving up.
    #[instrument(skip(self, profile, visited), fields(profile_id = %profile.id))]
    pub async fn scan(
        &self,
        profile: &ConnectionProfile,
        root: &str,
        visited: &VisitedDirectories,
    ) -> Result<ScanResult> {
        let root = normalize_folder_path(root);
        if visited.contains(&root).await {
            info!(root = %root, "Root already scanned in this run");
            return Ok(ScanResult::new());
        }
        let permits = self.settings.max_concurrent_listings.max(1);

        match self.scan_with_permits(profile, &root, permits, visited).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_retryable() && permits > 1 => {
                warn!(root = %root, error = %e, "Parallel scan failed, rescanning serially");
                self.scan_with_permits(profile, &root, 1, visited).await
            }
            Err(e) => Err(e),
        }
    }

    async fn scan_with_permits(
        &self,
        profile: &ConnectionProfile,
        root: &str,
        permits: usize,
        visited: &VisitedDirectories,
    ) -> Result<ScanResult> {
        let context = ScanContext::new(permits, visited);
        let result = match self
            .scan_directory(&context, profile, root.to_string(), 0)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                context.rollback().await;
                return Err(e);
            }
        };

        info!(
            root = %root,
            permits,
            audio_files = result.len(),
            covers = result.covers().len(),
            "Root scan finished"
        );
        Ok(result)
    }

    fn scan_directory<'a>(
        &'a self,
        context: &'a ScanContext<'a>,
        profile: &'a ConnectionProfile,
        path: String,
        depth: usize,
    ) -> BoxFuture<'a, Result<ScanResult>> {
        async move {
            let path = normalize_folder_path(&path);

            if depth > self.settings.max_depth {
                return Err(SyncError::ScanDepthExceeded { path, depth });
            }

            if !context.mark_visited(&path).await {
                debug!(path = %path, "Skipping already visited directory");
                return Ok(ScanResult::new());
            }

            let listing = {
                let _permit = context
                    .permits
                    .acquire()
                    .await
                    .map_err(|e| SyncError::Provider(format!("Scan permits closed: {}", e)))?;
                self.lister.list(profile, &path).await
            };
            let entries = match listing {
                Ok(entries) => entries,
                Err(e) => {
                    context.release(&path).await;
                    return Err(e);
                }
            };

            let mut result = ScanResult::new();
            let mut subdirectories = Vec::new();

            for entry in entries {
                if entry.is_directory {
                    subdirectories.push(entry.path);
                } else if self.is_audio(&entry) {
                    result.push_audio(entry);
                } else if self.is_cover(&entry) {
                    result.record_cover(&parent_folder_path(&entry.path), &entry.path);
                }
            }

            let children = join_all(
                subdirectories
                    .iter()
                    .map(|dir| self.scan_directory(context, profile, dir.clone(), depth + 1)),
            )
            .await;

            for (directory, child) in subdirectories.iter().zip(children) {
                match child {
                    Ok(child) => result.merge(child),
                    Err(e @ SyncError::ScanDepthExceeded { .. }) => {
                        warn!(directory = %directory, error = %e, "Depth limit reached, skipping subtree");
                    }
                    Err(e) => {
                        warn!(directory = %directory, error = %e, "Subtree scan failed, treating as empty");
                    }
                }
            }

            Ok(result)
        }
        .boxed()
    }

    fn entry_name<'e>(entry: &'e RemoteEntry) -> &'e str {
        if entry.name.is_empty() {
            crate::paths::folder_name(&entry.path)
        } else {
            &entry.name
        }
    }

    fn is_audio(&self, entry: &RemoteEntry) -> bool {
        let extension = extension_of(Self::entry_name(entry));
        !extension.is_empty() && self.settings.audio_extensions.contains(&extension)
    }

    fn is_cover(&self, entry: &RemoteEntry) -> bool {
        let name = Self::entry_name(entry);
        let extension = extension_of(name);
        let stem = file_base_name(name).to_lowercase();
        self.settings.cover_extensions.contains(&extension)
            && self.settings.cover_base_names.contains(&stem)
    }
}
