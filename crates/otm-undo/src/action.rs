#![forbid(unsafe_code)]

//! Reversible action contract.
//!
//! An [`UndoableAction`] records a state transition that usually has
//! **already happened**: a control changed its value, then an action is
//! built from the old value and whatever the control holds now and handed to
//! the [`UndoManager`]. `do_execute` is then mostly a check that something
//! actually changed, while `do_execute_undo` and `do_execute_redo` restore
//! the two recorded states.
//!
//! The provided `execute*` methods sequence the bookkeeping around the three
//! hooks: on success they fire the matching [`ActionDelegate`] hook and
//! timestamp the action in its [`ActionMetadata`].
//!
//! # Invariants
//!
//! - An action is bound to exactly one manager for its whole lifetime.
//! - `execute()` then `execute_undo()` restores the prior state.
//! - `execute_undo()` then `execute_redo()` restores the executed state.
//! - An action whose `can_merge` can return `true` MUST override `merge`.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use web_time::Instant;

use crate::manager::{UndoManager, WeakUndoManager};

/// Outcome of a do/undo/redo step.
///
/// `Ok(false)` is an expected outcome: the step had no effect or could not
/// complete. `Err` means the action is in an unknown state.
pub type ActionResult = Result<bool, ActionError>;

/// Unexpected failures raised by an action step or merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The action cannot run in the current state.
    InvalidState(String),
    /// The target changed since the action recorded it.
    StateDrift { expected: String, actual: String },
    /// Generic error with message.
    Other(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::StateDrift { expected, actual } => {
                write!(f, "state drift: expected '{expected}', got '{actual}'")
            }
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ActionError {}

/// Who or what produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionSource {
    /// Direct user edit in a control.
    #[default]
    User,
    /// Application code changing model state.
    Programmatic,
    /// Replayed from a recorded macro.
    Macro,
    /// Triggered by an external system.
    External,
}

impl ActionSource {
    /// Lowercase name used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Programmatic => "programmatic",
            Self::Macro => "macro",
            Self::External => "external",
        }
    }
}

type DelegateFn = Rc<dyn Fn()>;

/// Optional side-effect hooks run after a successful step.
///
/// Typical use is refreshing a view or marking the model dirty once an edit,
/// undo or redo has gone through.
#[derive(Clone, Default)]
pub struct ActionDelegate {
    on_execute: Option<DelegateFn>,
    on_undo: Option<DelegateFn>,
    on_redo: Option<DelegateFn>,
}

impl fmt::Debug for ActionDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDelegate")
            .field("has_execute", &self.on_execute.is_some())
            .field("has_undo", &self.on_undo.is_some())
            .field("has_redo", &self.on_redo.is_some())
            .finish()
    }
}

impl ActionDelegate {
    /// Create a delegate with no hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` after every successful execute.
    #[must_use]
    pub fn on_execute(mut self, f: impl Fn() + 'static) -> Self {
        self.on_execute = Some(Rc::new(f));
        self
    }

    /// Run `f` after every successful undo.
    #[must_use]
    pub fn on_undo(mut self, f: impl Fn() + 'static) -> Self {
        self.on_undo = Some(Rc::new(f));
        self
    }

    /// Run `f` after every successful redo.
    #[must_use]
    pub fn on_redo(mut self, f: impl Fn() + 'static) -> Self {
        self.on_redo = Some(Rc::new(f));
        self
    }

    fn fire(&self, step: Step) {
        let hook = match step {
            Step::Execute => &self.on_execute,
            Step::Undo => &self.on_undo,
            Step::Redo => &self.on_redo,
        };
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Execute,
    Undo,
    Redo,
}

/// Bookkeeping shared by every action.
pub struct ActionMetadata {
    /// Human-readable description for menus (e.g., "Rename business object").
    pub description: String,
    /// Who/what produced the action.
    pub source: ActionSource,
    last_executed: Option<Instant>,
    undo_count: u32,
    delegate: Option<ActionDelegate>,
    manager: WeakUndoManager,
}

impl fmt::Debug for ActionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionMetadata")
            .field("description", &self.description)
            .field("source", &self.source)
            .field("last_executed", &self.last_executed)
            .field("undo_count", &self.undo_count)
            .field("delegate", &self.delegate)
            .field("manager_alive", &self.manager.is_alive())
            .finish()
    }
}

impl ActionMetadata {
    /// Create metadata bound to `manager`.
    ///
    /// Only a weak handle is kept; the action never keeps its manager alive.
    #[must_use]
    pub fn new(manager: &UndoManager, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            source: ActionSource::User,
            last_executed: None,
            undo_count: 0,
            delegate: None,
            manager: manager.downgrade(),
        }
    }

    /// Attach delegate hooks.
    #[must_use]
    pub fn with_delegate(mut self, delegate: ActionDelegate) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Set the action source.
    #[must_use]
    pub fn with_source(mut self, source: ActionSource) -> Self {
        self.source = source;
        self
    }

    /// When the action last completed a step successfully.
    #[must_use]
    pub fn last_executed(&self) -> Option<Instant> {
        self.last_executed
    }

    /// Number of successful undos this action has gone through.
    #[must_use]
    pub fn undo_count(&self) -> u32 {
        self.undo_count
    }

    /// Handle to the owning manager.
    #[must_use]
    pub fn manager(&self) -> &WeakUndoManager {
        &self.manager
    }

    /// Refresh the execution timestamp. Merging actions call this after
    /// absorbing a candidate.
    pub fn touch(&mut self) {
        self.last_executed = Some(Instant::now());
    }

    fn complete(&mut self, step: Step) {
        if step == Step::Undo {
            self.undo_count = self.undo_count.saturating_add(1);
        }
        if let Some(delegate) = &self.delegate {
            delegate.fire(step);
        }
        self.touch();
    }
}

/// A reversible unit of work managed by an [`UndoManager`].
///
/// Implementors supply the three `do_*` hooks; callers use the provided
/// `execute*` methods (or let the manager call them).
pub trait UndoableAction: Any {
    /// Perform (or confirm) the forward step.
    fn do_execute(&mut self) -> ActionResult;

    /// Revert the forward step.
    fn do_execute_undo(&mut self) -> ActionResult;

    /// Re-apply the forward step after an undo.
    fn do_execute_redo(&mut self) -> ActionResult;

    /// Shared bookkeeping.
    fn metadata(&self) -> &ActionMetadata;

    /// Shared bookkeeping, mutable.
    fn metadata_mut(&mut self) -> &mut ActionMetadata;

    /// Downcast support for merge checks.
    fn as_any(&self) -> &dyn Any;

    /// Run the forward step; on success fire the execute hook and timestamp.
    fn execute(&mut self) -> ActionResult {
        let result = self.do_execute();
        if matches!(result, Ok(true)) {
            self.metadata_mut().complete(Step::Execute);
        }
        result
    }

    /// Run the undo step; on success fire the undo hook and timestamp.
    fn execute_undo(&mut self) -> ActionResult {
        let result = self.do_execute_undo();
        if matches!(result, Ok(true)) {
            self.metadata_mut().complete(Step::Undo);
        }
        result
    }

    /// Run the redo step; on success fire the redo hook and timestamp.
    fn execute_redo(&mut self) -> ActionResult {
        let result = self.do_execute_redo();
        if matches!(result, Ok(true)) {
            self.metadata_mut().complete(Step::Redo);
        }
        result
    }

    /// Whether `candidate`, which just executed, can be folded into this
    /// action instead of becoming a new undo step.
    fn can_merge(&self, _candidate: &dyn UndoableAction) -> bool {
        false
    }

    /// Absorb the new state of `candidate`.
    ///
    /// # Panics
    ///
    /// The default panics: an action that reports `can_merge == true` must
    /// implement its own merge.
    fn merge(&mut self, _candidate: &dyn UndoableAction) -> Result<(), ActionError> {
        panic!(
            "{} reported can_merge but does not implement merge",
            self.debug_name()
        )
    }

    /// Description for menus and logs.
    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Who or what produced the action.
    fn source(&self) -> ActionSource {
        self.metadata().source
    }

    /// Type name used in logs and debug output.
    fn debug_name(&self) -> &'static str {
        "UndoableAction"
    }

    /// Hand this action to its manager for execution and recording.
    ///
    /// Returns `false` if the manager is gone or rejected the action.
    fn submit(self) -> bool
    where
        Self: Sized,
    {
        let Some(manager) = self.metadata().manager().upgrade() else {
            tracing::warn!(
                target: "otm.undo",
                action = %self.description(),
                "submit on an action whose manager has been dropped"
            );
            return false;
        };
        manager.execute(Box::new(self))
    }
}

impl fmt::Debug for dyn UndoableAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.debug_name())
            .field("description", &self.description())
            .field("last_executed", &self.metadata().last_executed())
            .finish()
    }
}
