//! # Remote Song Sync Engine
//!
//! Mirrors the audio files of a WebDAV server into a local song cache.
//!
//! ## Overview
//!
//! One run walks every selected root folder of a connection profile, infers
//! title, artist and album from file and folder names, diffs the result
//! against the cached songs and persists the difference. A folder that fails
//! to scan never causes deletions below it.
//!
//! ## Components
//!
//! - **Lister** (`lister`): lists one directory with retry and backoff
//! - **Scanner** (`scanner`): bounded-concurrency recursive walk of one root
//! - **Metadata Inference** (`metadata`): filename and folder heuristics
//! - **Differ** (`differ`): stale-by-selection, stale-by-absence and upserts
//! - **Identity** (`identity`): deterministic ids for songs, artists and albums
//! - **Run State Machine** (`job`): validated phases of one run
//! - **Progress** (`progress`): per-folder progress sink
//! - **Sync Coordinator** (`coordinator`): drives a run end to end

pub mod coordinator;
pub mod differ;
pub mod error;
pub mod identity;
pub mod job;
pub mod lister;
pub mod metadata;
pub mod paths;
pub mod progress;
pub mod scanner;

pub use coordinator::SyncCoordinator;
pub use differ::{DiffInput, FolderScan, IncrementalDiffer, PendingUpsert, SyncDiff};
pub use error::{Result, SyncError};
pub use identity::{synthesize_entity_id, EntityKind};
pub use job::{SyncJobId, SyncOutcome, SyncPhase, SyncRun, SyncStatus};
pub use lister::RemoteFileLister;
pub use metadata::{MetadataInferencer, ParsedMetadata};
pub use progress::{EventBusProgressSink, FolderProgress, NoopProgressSink, ProgressSink};
pub use scanner::{RecursiveScanner, ScanResult, VisitedDirectories};
