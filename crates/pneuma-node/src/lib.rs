//! # pneuma-node — Anchoring Node
//!
//! The node that ties the workspace together: it watches a pending
//! directory for breathing-analysis JSON files, stores each payload in the
//! content store, anchors the content id on the ledger, and files the
//! input away as processed.
//!
//! ## Modules
//!
//! - [`config`] — JSON configuration file, backend selection, factories.
//! - [`workflow`] — the store-then-anchor orchestration and ledger reads.
//! - [`watcher`] — directory polling with bounded concurrency, per-file
//!   retry with exponential backoff, and a dead-letter path.
//! - [`status`] — periodic ledger status snapshots for observability.
//!
//! ## Deployment Constraint
//!
//! Single instance only. Two nodes watching the same directory race on
//! file renames; there is no distributed lock or leader election.

pub mod config;
pub mod status;
pub mod watcher;
pub mod workflow;

pub use config::NodeConfig;
pub use watcher::{DirectoryWatcher, RetryPolicy};
pub use workflow::{AnchorOutcome, AnchoringWorkflow, WorkflowError};
