//! Post-lifecycle workflow engine.
//!
//! The lifecycle controller drives each discovered item from scoring through
//! draft generation, the optional edit/attach/reply steps, and publication;
//! the workspace holds per-item working state; reconciliation and thread
//! resolution keep reply links honest against the channel's actual state.

pub mod controller;
pub mod reconcile;
pub mod threading;
pub mod workspace;

pub use controller::{CheckReport, LifecycleController, PublishOutcome, ReplyPage, StatusReport};
pub use threading::ThreadResolver;
pub use workspace::{DraftEntry, ItemState, PendingKind, Workspace};
