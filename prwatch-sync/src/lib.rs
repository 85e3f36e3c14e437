//! # prwatch-sync
//!
//! Reconciles the bookmark folder and tab group against the open pull
//! requests a user is involved in.
//!
//! Call [`Orchestrator::run_cycle`] to fetch, diff and apply once, or
//! [`Orchestrator::plan_cycle`] for a dry run. Browser surfaces sit behind
//! the [`BookmarkSurface`] and [`TabSurface`] traits.

pub mod bookmarks;
pub mod browser_state;
pub mod diff;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod surface;
pub mod tabs;

pub use bookmarks::{BookmarkPlan, BookmarkReconciler};
pub use browser_state::{browser_state_path_at, BrowserState, FileSurface};
pub use diff::{diff_surface, ReconcileReport, SurfaceDiff};
pub use error::{SurfaceError, SyncError};
pub use memory::{MemorySurface, SurfaceOp};
pub use pipeline::{
    test_connection, CycleOutcome, CyclePlan, CycleState, CycleSummary, Orchestrator, PlanOutcome,
    SkipReason,
};
pub use surface::{BookmarkSurface, TabSurface};
pub use tabs::{TabGroupReconciler, TabPlan};
