#![forbid(unsafe_code)]

//! Undo manager: dual bounded stacks of executed actions.
//!
//! ```text
//! execute(A), execute(B), execute(C)
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [A, B, C]                          │
//! │ Redo Stack: []                                 │
//! └───────────────────────────────────────────────┘
//!
//! execute_undo() x2
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [A]                                │
//! │ Redo Stack: [C, B]                             │
//! └───────────────────────────────────────────────┘
//!
//! execute(D)  <-- new branch, clears redo
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [A, D]                             │
//! │ Redo Stack: []                                 │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. Every successful, non-merged `execute` clears the redo stack.
//! 2. With a non-negative `max_undo_count`, neither stack holds more than
//!    that many actions; the oldest are evicted first.
//! 3. Any action error (execute, undo, redo or merge) leaves both stacks
//!    empty.
//! 4. Listeners are notified exactly when `(can_undo, can_redo)` changes.
//! 5. An action recorded after a completed undo or redo is never merged into
//!    the action below it.
//!
//! # Reentrancy
//!
//! [`UndoManager`] is a shared handle (`Rc`). No interior borrow is held
//! while action, delegate or listener code runs, so callbacks may call back
//! into the manager. While an action step runs, action execution is
//! disabled: an undo that restores a control value fires the control's
//! change handler, whose submission is then rejected instead of being
//! recorded as a new edit.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::action::{ActionResult, ActionSource, UndoableAction};
use crate::config::HistoryConfig;
use crate::listener::{ListenerSet, UndoStatusListener};

type ActionBox = Box<dyn UndoableAction>;

/// Undo/redo availability, the state listeners are notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UndoStatus {
    pub can_undo: bool,
    pub can_redo: bool,
}

#[derive(Default)]
struct Stacks {
    /// Newest at back.
    undo: VecDeque<ActionBox>,
    /// Newest at back.
    redo: VecDeque<ActionBox>,
}

impl Stacks {
    fn status(&self) -> UndoStatus {
        UndoStatus {
            can_undo: !self.undo.is_empty(),
            can_redo: !self.redo.is_empty(),
        }
    }

    /// Evict from the oldest end of each stack down to `limit`.
    fn truncate(&mut self, limit: Option<usize>) -> Vec<ActionBox> {
        let Some(limit) = limit else {
            return Vec::new();
        };
        let mut evicted = Vec::new();
        for stack in [&mut self.undo, &mut self.redo] {
            while stack.len() > limit {
                if let Some(action) = stack.pop_front() {
                    evicted.push(action);
                }
            }
        }
        evicted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

impl Direction {
    fn span_name(self) -> &'static str {
        match self {
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

struct Inner {
    stacks: RefCell<Stacks>,
    config: RefCell<HistoryConfig>,
    execution_enabled: Cell<bool>,
    /// Set by a completed undo/redo, cleared when the next action is recorded.
    merge_barrier: Cell<bool>,
    listeners: RefCell<ListenerSet>,
}

/// Restores the execution flag when dropped, including during unwinding.
struct ExecutionGuard<'a> {
    flag: &'a Cell<bool>,
    was_enabled: bool,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.was_enabled);
    }
}

/// Manager for undo/redo history.
///
/// Cloning creates another handle to the same history.
#[derive(Clone)]
pub struct UndoManager {
    inner: Rc<Inner>,
}

/// Non-owning handle to an [`UndoManager`], held by actions and bindings.
#[derive(Clone, Default)]
pub struct WeakUndoManager {
    inner: Weak<Inner>,
}

impl WeakUndoManager {
    /// Recover the manager if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<UndoManager> {
        self.inner.upgrade().map(|inner| UndoManager { inner })
    }

    /// Whether the manager is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Whether both handles refer to the same manager.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for WeakUndoManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakUndoManager")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoManager")
            .field("undo_depth", &self.undo_depth())
            .field("redo_depth", &self.redo_depth())
            .field("max_undo_count", &self.max_undo_count())
            .field("execution_enabled", &self.is_action_execution_enabled())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl UndoManager {
    /// Create a manager with the given configuration.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                stacks: RefCell::new(Stacks::default()),
                config: RefCell::new(config),
                execution_enabled: Cell::new(true),
                merge_barrier: Cell::new(false),
                listeners: RefCell::new(ListenerSet::default()),
            }),
        }
    }

    /// Non-owning handle for back-references.
    #[must_use]
    pub fn downgrade(&self) -> WeakUndoManager {
        WeakUndoManager {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same manager.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Execute `action` and record it.
    ///
    /// Returns `false` without running the action while execution is
    /// disabled. On success the action is merged into the top of the undo
    /// stack (if that action accepts it) or pushed, and the redo stack is
    /// cleared. An action reporting `Ok(false)` is discarded and history is
    /// kept. An action error, or a merge error, purges all history.
    pub fn execute(&self, mut action: ActionBox) -> bool {
        if !self.is_action_execution_enabled() {
            tracing::debug!(
                target: "otm.undo",
                action = %action.description(),
                "action rejected: execution disabled"
            );
            return false;
        }

        let _span = tracing::debug_span!(
            "undo.execute",
            action = %action.description(),
            source = action.source().as_str(),
        )
        .entered();

        let before = self.status();
        let outcome = self.guarded(|| action.execute());
        let success = match outcome {
            Ok(true) => self.record(action),
            Ok(false) => {
                tracing::debug!(
                    target: "otm.undo",
                    action = %action.description(),
                    "action had no effect; discarded"
                );
                false
            }
            Err(err) => {
                tracing::error!(
                    target: "otm.undo",
                    action = %action.description(),
                    error = %err,
                    "action failed during execute; purging history"
                );
                drop(action);
                self.clear_stacks();
                false
            }
        };
        self.notify_if_changed(before);
        success
    }

    /// Undo the most recent action.
    ///
    /// Returns `false` if there is nothing to undo. A failed undo purges all
    /// history.
    pub fn execute_undo(&self) -> bool {
        self.step(Direction::Undo)
    }

    /// Redo the most recently undone action.
    ///
    /// Returns `false` if there is nothing to redo. A failed redo purges all
    /// history.
    pub fn execute_redo(&self) -> bool {
        self.step(Direction::Redo)
    }

    /// Discard all undo and redo history.
    pub fn purge(&self) {
        let before = self.status();
        self.clear_stacks();
        self.notify_if_changed(before);
    }

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.status().can_undo
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.status().can_redo
    }

    /// Current undo/redo availability.
    #[must_use]
    pub fn status(&self) -> UndoStatus {
        self.inner.stacks.borrow().status()
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Maximum actions kept per stack; negative means unlimited.
    #[must_use]
    pub fn max_undo_count(&self) -> isize {
        self.inner.config.borrow().max_undo_count
    }

    /// Change the depth limit, truncating both stacks immediately.
    ///
    /// `0` keeps no history at all.
    pub fn set_max_undo_count(&self, max_undo_count: isize) {
        let before = self.status();
        let limit = {
            let mut config = self.inner.config.borrow_mut();
            config.max_undo_count = max_undo_count;
            config.depth_limit()
        };
        let evicted = self.inner.stacks.borrow_mut().truncate(limit);
        if !evicted.is_empty() {
            tracing::debug!(
                target: "otm.undo",
                evicted = evicted.len(),
                max_undo_count,
                "history truncated to new limit"
            );
        }
        drop(evicted);
        self.notify_if_changed(before);
    }

    /// Snapshot of the active configuration.
    #[must_use]
    pub fn config(&self) -> HistoryConfig {
        self.inner.config.borrow().clone()
    }

    /// Stop recording submitted actions (e.g., during bulk model changes).
    pub fn disable_action_execution(&self) {
        self.inner.execution_enabled.set(false);
    }

    /// Resume recording submitted actions.
    pub fn enable_action_execution(&self) {
        self.inner.execution_enabled.set(true);
    }

    /// Whether submitted actions are currently executed and recorded.
    #[must_use]
    pub fn is_action_execution_enabled(&self) -> bool {
        self.inner.execution_enabled.get()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a status listener. Adding the same listener twice is a
    /// no-op; returns whether it was newly added.
    ///
    /// Only a weak reference is kept.
    pub fn add_listener(&self, listener: &Rc<dyn UndoStatusListener>) -> bool {
        self.inner.listeners.borrow_mut().add(listener)
    }

    /// Unregister a status listener; returns whether it was registered.
    pub fn remove_listener(&self, listener: &Rc<dyn UndoStatusListener>) -> bool {
        self.inner.listeners.borrow_mut().remove(listener)
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Get the undo stack depth.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.inner.stacks.borrow().undo.len()
    }

    /// Get the redo stack depth.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.inner.stacks.borrow().redo.len()
    }

    /// Description of the action the next undo would revert.
    #[must_use]
    pub fn next_undo_description(&self) -> Option<String> {
        let stacks = self.inner.stacks.borrow();
        stacks.undo.back().map(|a| a.description().to_string())
    }

    /// Description of the action the next redo would re-apply.
    #[must_use]
    pub fn next_redo_description(&self) -> Option<String> {
        let stacks = self.inner.stacks.borrow();
        stacks.redo.back().map(|a| a.description().to_string())
    }

    /// Undo descriptions, most recent first.
    pub fn undo_descriptions(&self, limit: usize) -> Vec<String> {
        self.descriptions(Direction::Undo, None, limit)
    }

    /// Redo descriptions, most recent first.
    pub fn redo_descriptions(&self, limit: usize) -> Vec<String> {
        self.descriptions(Direction::Redo, None, limit)
    }

    /// Undo descriptions of actions from `source`, most recent first.
    pub fn undo_descriptions_from(&self, source: ActionSource, limit: usize) -> Vec<String> {
        self.descriptions(Direction::Undo, Some(source), limit)
    }

    /// Redo descriptions of actions from `source`, most recent first.
    pub fn redo_descriptions_from(&self, source: ActionSource, limit: usize) -> Vec<String> {
        self.descriptions(Direction::Redo, Some(source), limit)
    }

    fn descriptions(
        &self,
        direction: Direction,
        source: Option<ActionSource>,
        limit: usize,
    ) -> Vec<String> {
        let stacks = self.inner.stacks.borrow();
        let stack = match direction {
            Direction::Undo => &stacks.undo,
            Direction::Redo => &stacks.redo,
        };
        stack
            .iter()
            .rev()
            .filter(|a| source.is_none_or(|s| a.source() == s))
            .take(limit)
            .map(|a| a.description().to_string())
            .collect()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Run `f` with action execution disabled, restoring the previous state
    /// even if `f` panics.
    fn guarded<R>(&self, f: impl FnOnce() -> R) -> R {
        let flag = &self.inner.execution_enabled;
        let _guard = ExecutionGuard {
            flag,
            was_enabled: flag.replace(false),
        };
        f()
    }

    /// Merge or push a freshly executed action. Returns `false` if a merge
    /// error purged the history.
    fn record(&self, action: ActionBox) -> bool {
        let top = self.inner.stacks.borrow_mut().undo.pop_back();
        let after_step = self.inner.merge_barrier.replace(false);

        let top = match top {
            Some(mut top) if !after_step && top.can_merge(action.as_ref()) => {
                let merged = self.guarded(|| top.merge(action.as_ref()));
                match merged {
                    Ok(()) => {
                        tracing::debug!(
                            target: "otm.undo",
                            into = %top.description(),
                            "action merged into previous"
                        );
                        let redo = {
                            let mut stacks = self.inner.stacks.borrow_mut();
                            stacks.undo.push_back(top);
                            std::mem::take(&mut stacks.redo)
                        };
                        drop(redo);
                        return true;
                    }
                    Err(err) => {
                        tracing::error!(
                            target: "otm.undo",
                            action = %action.description(),
                            into = %top.description(),
                            error = %err,
                            "action merge failed; purging history"
                        );
                        drop(top);
                        drop(action);
                        self.clear_stacks();
                        return false;
                    }
                }
            }
            top => top,
        };

        tracing::debug!(
            target: "otm.undo",
            action = %action.description(),
            source = action.source().as_str(),
            "action executed"
        );
        let limit = self.inner.config.borrow().depth_limit();
        let (redo, evicted) = {
            let mut stacks = self.inner.stacks.borrow_mut();
            if let Some(top) = top {
                stacks.undo.push_back(top);
            }
            stacks.undo.push_back(action);
            let redo = std::mem::take(&mut stacks.redo);
            (redo, stacks.truncate(limit))
        };
        if !evicted.is_empty() {
            tracing::debug!(
                target: "otm.undo",
                evicted = evicted.len(),
                "oldest actions evicted"
            );
        }
        drop(redo);
        drop(evicted);
        true
    }

    /// Shared body of undo and redo.
    fn step(&self, direction: Direction) -> bool {
        let before = self.status();
        let popped = {
            let mut stacks = self.inner.stacks.borrow_mut();
            match direction {
                Direction::Undo => stacks.undo.pop_back(),
                Direction::Redo => stacks.redo.pop_back(),
            }
        };
        let Some(mut action) = popped else {
            return false;
        };

        let _span = tracing::debug_span!(
            "undo.step",
            direction = direction.span_name(),
            action = %action.description(),
            source = action.source().as_str(),
        )
        .entered();

        let outcome: ActionResult = self.guarded(|| match direction {
            Direction::Undo => action.execute_undo(),
            Direction::Redo => action.execute_redo(),
        });

        let success = match outcome {
            Ok(true) => {
                tracing::debug!(
                    target: "otm.undo",
                    direction = direction.span_name(),
                    action = %action.description(),
                    "action step completed"
                );
                let limit = self.inner.config.borrow().depth_limit();
                let evicted = {
                    let mut stacks = self.inner.stacks.borrow_mut();
                    match direction {
                        Direction::Undo => stacks.redo.push_back(action),
                        Direction::Redo => stacks.undo.push_back(action),
                    }
                    stacks.truncate(limit)
                };
                drop(evicted);
                self.inner.merge_barrier.set(true);
                true
            }
            Ok(false) => {
                tracing::warn!(
                    target: "otm.undo",
                    direction = direction.span_name(),
                    action = %action.description(),
                    "action step did not complete; purging history"
                );
                drop(action);
                self.clear_stacks();
                false
            }
            Err(err) => {
                tracing::error!(
                    target: "otm.undo",
                    direction = direction.span_name(),
                    action = %action.description(),
                    error = %err,
                    "action step failed; purging history"
                );
                drop(action);
                self.clear_stacks();
                false
            }
        };
        self.notify_if_changed(before);
        success
    }

    /// Empty both stacks. Actions are dropped after the borrow is released.
    fn clear_stacks(&self) {
        let cleared = std::mem::take(&mut *self.inner.stacks.borrow_mut());
        drop(cleared);
    }

    fn notify_if_changed(&self, before: UndoStatus) {
        let after = self.status();
        if after == before {
            return;
        }
        // Collect first so no borrow is held while listeners run.
        let listeners = self.inner.listeners.borrow_mut().live();
        tracing::trace!(
            target: "otm.undo",
            can_undo = after.can_undo,
            can_redo = after.can_redo,
            listeners = listeners.len(),
            "undo status changed"
        );
        for listener in &listeners {
            listener.on_undo_status_changed(self);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
