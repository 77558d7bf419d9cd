#![forbid(unsafe_code)]

//! OTM Undo
//!
//! Undo/redo command manager for the OTM model editor suite. Editor controls
//! record the edits a user has already made as [`UndoableAction`]s and
//! submit them to an [`UndoManager`], which keeps bounded undo and redo
//! stacks, coalesces rapid edits, and tells listeners when undo or redo
//! availability changes.
//!
//! # Key Components
//!
//! - [`UndoableAction`] - Reversible unit of work (do, undo, redo, merge)
//! - [`ActionMetadata`] - Timestamp, delegate hooks and manager back-reference
//! - [`UndoManager`] - Dual-stack history with truncation and fail-safe purge
//! - [`UndoStatusListener`] - Observer of `can_undo`/`can_redo` changes
//! - [`HistoryConfig`] - Depth limit and merge pause
//!
//! # Failure policy
//!
//! Actions report problems through [`ActionResult`]. An `Err` from any step,
//! or from a merge, is logged and discards the whole history: an action left
//! in an unknown state would corrupt every later undo or redo. Manager
//! operations only ever report `true`/`false` to the caller.

pub mod action;
pub mod config;
pub mod listener;
pub mod manager;

pub use action::{
    ActionDelegate, ActionError, ActionMetadata, ActionResult, ActionSource, UndoableAction,
};
pub use config::{ConfigError, HistoryConfig, MergePolicy};
pub use listener::{UndoStatusListener, status_listener};
pub use manager::{UndoManager, UndoStatus, WeakUndoManager};
