#![forbid(unsafe_code)]

//! Scenario tests for UndoManager history semantics.
//!
//! Covers:
//! - Depth limits with eviction of the oldest actions
//! - Full undo back to the initial state, and undo/redo round trips
//! - Purge on errors from every action step and from merges
//! - Merge coalescing owned by the top-of-stack action
//! - No merging across a completed undo or redo
//! - Reentrant submissions from delegate hooks
//! - `set_max_undo_count(0)` dropping all history

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use otm_undo::{
    ActionDelegate, ActionError, ActionMetadata, ActionResult, HistoryConfig, UndoManager,
    UndoableAction, status_listener,
};

// ============================================================================
// Test actions
// ============================================================================

/// Which step should fail with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailAt {
    Nothing,
    Execute,
    Undo,
    Redo,
}

/// Sets a shared cell from `old` to `new`. Actions with `mergeable` set
/// coalesce when they target the same cell.
struct SetCell {
    metadata: ActionMetadata,
    cell: Rc<Cell<i64>>,
    old: i64,
    new: i64,
    fail_at: FailAt,
    mergeable: bool,
    merge_fails: bool,
}

impl SetCell {
    fn new(manager: &UndoManager, cell: &Rc<Cell<i64>>, new: i64) -> Self {
        Self {
            metadata: ActionMetadata::new(manager, format!("Set {new}")),
            cell: cell.clone(),
            old: cell.get(),
            new,
            fail_at: FailAt::Nothing,
            mergeable: false,
            merge_fails: false,
        }
    }

    fn failing(mut self, fail_at: FailAt) -> Self {
        self.fail_at = fail_at;
        self
    }

    fn mergeable(mut self) -> Self {
        self.mergeable = true;
        self
    }

    fn check(&self, step: FailAt) -> Result<(), ActionError> {
        if self.fail_at == step {
            return Err(ActionError::Other(format!("{step:?} failed")));
        }
        Ok(())
    }
}

impl UndoableAction for SetCell {
    fn do_execute(&mut self) -> ActionResult {
        self.check(FailAt::Execute)?;
        self.cell.set(self.new);
        Ok(self.old != self.new)
    }

    fn do_execute_undo(&mut self) -> ActionResult {
        self.check(FailAt::Undo)?;
        self.cell.set(self.old);
        Ok(true)
    }

    fn do_execute_redo(&mut self) -> ActionResult {
        self.check(FailAt::Redo)?;
        self.cell.set(self.new);
        Ok(true)
    }

    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ActionMetadata {
        &mut self.metadata
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn can_merge(&self, candidate: &dyn UndoableAction) -> bool {
        let Some(other) = candidate.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.mergeable && other.mergeable && Rc::ptr_eq(&self.cell, &other.cell)
    }

    fn merge(&mut self, candidate: &dyn UndoableAction) -> Result<(), ActionError> {
        let Some(other) = candidate.as_any().downcast_ref::<Self>() else {
            return Err(ActionError::InvalidState("not a SetCell".into()));
        };
        if self.merge_fails {
            return Err(ActionError::Other("merge failed".into()));
        }
        self.new = other.new;
        self.metadata.description = format!("Set {}", self.new);
        self.metadata.touch();
        Ok(())
    }

    fn debug_name(&self) -> &'static str {
        "SetCell"
    }
}

/// Claims mergeability without implementing merge.
struct Greedy {
    metadata: ActionMetadata,
}

impl UndoableAction for Greedy {
    fn do_execute(&mut self) -> ActionResult {
        Ok(true)
    }
    fn do_execute_undo(&mut self) -> ActionResult {
        Ok(true)
    }
    fn do_execute_redo(&mut self) -> ActionResult {
        Ok(true)
    }
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut ActionMetadata {
        &mut self.metadata
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn can_merge(&self, _candidate: &dyn UndoableAction) -> bool {
        true
    }
    fn debug_name(&self) -> &'static str {
        "Greedy"
    }
}

fn cell() -> Rc<Cell<i64>> {
    Rc::new(Cell::new(0))
}

fn run(manager: &UndoManager, cell: &Rc<Cell<i64>>, value: i64) -> bool {
    SetCell::new(manager, cell, value).submit()
}

// ============================================================================
// Depth limits
// ============================================================================

#[test]
fn limit_of_three_keeps_newest_and_fills_redo() {
    let manager = UndoManager::new(HistoryConfig::new(3));
    let cell = cell();
    for v in 1..=4 {
        assert!(run(&manager, &cell, v));
    }

    assert_eq!(manager.undo_descriptions(10), vec!["Set 4", "Set 3", "Set 2"]);
    assert!(manager.can_undo());

    for _ in 0..3 {
        assert!(manager.execute_undo());
    }
    assert!(!manager.can_undo());
    assert!(manager.can_redo());
    assert_eq!(manager.redo_depth(), 3);
    assert_eq!(manager.redo_descriptions(10), vec!["Set 2", "Set 3", "Set 4"]);
    // "Set 1" was evicted, so the cell is left at its value.
    assert_eq!(cell.get(), 1);
}

#[test]
fn limit_of_twenty_after_twenty_five_actions() {
    let manager = UndoManager::new(HistoryConfig::new(20));
    let cell = cell();
    for v in 1..=25 {
        run(&manager, &cell, v);
    }
    assert_eq!(manager.undo_depth(), 20);
    let descriptions = manager.undo_descriptions(usize::MAX);
    assert_eq!(descriptions.first().map(String::as_str), Some("Set 25"));
    assert_eq!(descriptions.last().map(String::as_str), Some("Set 6"));
}

#[test]
fn zero_limit_drops_everything_with_one_notification() {
    let manager = UndoManager::default();
    let cell = cell();
    run(&manager, &cell, 1);
    run(&manager, &cell, 2);
    manager.execute_undo();

    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let listener = status_listener(move |_| seen.set(seen.get() + 1));
    manager.add_listener(&listener);

    manager.set_max_undo_count(0);
    assert_eq!(manager.undo_depth(), 0);
    assert_eq!(manager.redo_depth(), 0);
    assert_eq!(calls.get(), 1);

    // Nothing is retained from now on.
    assert!(run(&manager, &cell, 3));
    assert!(!manager.can_undo());
    assert_eq!(calls.get(), 1);
}

#[test]
fn negative_limit_is_unlimited() {
    let manager = UndoManager::new(HistoryConfig::new(5));
    manager.set_max_undo_count(-1);
    let cell = cell();
    for v in 1..=50 {
        run(&manager, &cell, v);
    }
    assert_eq!(manager.undo_depth(), 50);
    assert_eq!(manager.max_undo_count(), -1);
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn undoing_everything_restores_initial_state() {
    let manager = UndoManager::new(HistoryConfig::unlimited());
    let cell = cell();
    let n = 12;
    for v in 1..=n {
        run(&manager, &cell, v * 10);
    }
    for i in 0..n {
        assert!(manager.can_undo(), "undo {i} should be available");
        assert!(manager.execute_undo());
    }
    assert_eq!(cell.get(), 0);
    assert!(!manager.can_undo());
    assert_eq!(manager.redo_depth(), n as usize);
}

#[test]
fn execute_undo_redo_round_trip() {
    let manager = UndoManager::default();
    let cell = cell();
    run(&manager, &cell, 5);
    let after_execute = (cell.get(), manager.status(), manager.undo_depth());

    assert!(manager.execute_undo());
    assert!(manager.execute_redo());
    assert_eq!(
        (cell.get(), manager.status(), manager.undo_depth()),
        after_execute
    );
}

#[test]
fn unchanged_value_is_discarded_without_touching_history() {
    let manager = UndoManager::default();
    let cell = cell();
    run(&manager, &cell, 1);
    run(&manager, &cell, 2);
    manager.execute_undo();

    assert!(!run(&manager, &cell, 1));
    assert_eq!(manager.undo_depth(), 1);
    assert_eq!(manager.redo_depth(), 1);
}

// ============================================================================
// Failure purges
// ============================================================================

#[test]
fn errors_from_any_step_purge_history() {
    for fail_at in [FailAt::Execute, FailAt::Undo, FailAt::Redo] {
        let manager = UndoManager::default();
        let cell = cell();
        run(&manager, &cell, 1);
        let failing = SetCell::new(&manager, &cell, 2).failing(fail_at);
        let submitted = failing.submit();

        match fail_at {
            FailAt::Execute => assert!(!submitted),
            FailAt::Undo => {
                assert!(submitted);
                assert!(!manager.execute_undo());
            }
            FailAt::Redo => {
                assert!(submitted);
                assert!(manager.execute_undo());
                assert!(!manager.execute_redo());
            }
            FailAt::Nothing => unreachable!(),
        }

        assert!(!manager.can_undo(), "{fail_at:?}: undo must be purged");
        assert!(!manager.can_redo(), "{fail_at:?}: redo must be purged");
        assert!(manager.is_action_execution_enabled());
    }
}

#[test]
fn purge_fires_status_notification() {
    let manager = UndoManager::default();
    let cell = cell();
    run(&manager, &cell, 1);

    let calls = Rc::new(Cell::new(0));
    let seen = calls.clone();
    let listener = status_listener(move |m: &UndoManager| {
        assert!(!m.can_undo());
        seen.set(seen.get() + 1);
    });
    manager.add_listener(&listener);

    SetCell::new(&manager, &cell, 2)
        .failing(FailAt::Execute)
        .submit();
    assert_eq!(calls.get(), 1);
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn mergeable_actions_coalesce_into_one_entry() {
    let manager = UndoManager::default();
    let cell = cell();
    SetCell::new(&manager, &cell, 1).mergeable().submit();
    SetCell::new(&manager, &cell, 2).mergeable().submit();
    SetCell::new(&manager, &cell, 3).mergeable().submit();

    assert_eq!(manager.undo_depth(), 1);
    assert_eq!(manager.next_undo_description().as_deref(), Some("Set 3"));

    assert!(manager.execute_undo());
    assert_eq!(cell.get(), 0);
    assert!(manager.execute_redo());
    assert_eq!(cell.get(), 3);
}

#[test]
fn undo_of_later_action_blocks_merge_into_earlier_one() {
    let manager = UndoManager::default();
    let cell = cell();
    let other = Rc::new(Cell::new(0));
    SetCell::new(&manager, &cell, 1).mergeable().submit();
    SetCell::new(&manager, &other, 9).submit();
    manager.execute_undo();
    assert!(manager.can_redo());

    SetCell::new(&manager, &cell, 2).mergeable().submit();
    assert_eq!(manager.undo_depth(), 2);
    assert!(!manager.can_redo());

    // The next candidate follows a recorded action again and merges.
    SetCell::new(&manager, &cell, 3).mergeable().submit();
    assert_eq!(manager.undo_depth(), 2);
    manager.execute_undo();
    assert_eq!(cell.get(), 1);
}

#[test]
fn redo_also_blocks_merge() {
    let manager = UndoManager::default();
    let cell = cell();
    SetCell::new(&manager, &cell, 1).mergeable().submit();
    manager.execute_undo();
    manager.execute_redo();
    SetCell::new(&manager, &cell, 2).mergeable().submit();
    assert_eq!(manager.undo_depth(), 2);
}

#[test]
fn merge_decision_belongs_to_previous_action() {
    let manager = UndoManager::default();
    let cell = cell();
    // The previous action is not mergeable, so a mergeable candidate is pushed.
    SetCell::new(&manager, &cell, 1).submit();
    SetCell::new(&manager, &cell, 2).mergeable().submit();
    assert_eq!(manager.undo_depth(), 2);
}

#[test]
fn merge_error_purges_history() {
    let manager = UndoManager::default();
    let cell = cell();
    run(&manager, &cell, 1);
    let mut top = SetCell::new(&manager, &cell, 2).mergeable();
    top.merge_fails = true;
    top.submit();
    assert_eq!(manager.undo_depth(), 2);

    assert!(!SetCell::new(&manager, &cell, 3).mergeable().submit());
    assert!(!manager.can_undo());
    assert!(!manager.can_redo());
}

#[test]
#[should_panic(expected = "Greedy reported can_merge but does not implement merge")]
fn claiming_merge_without_implementing_it_panics() {
    let manager = UndoManager::default();
    let greedy = |m: &UndoManager| Greedy {
        metadata: ActionMetadata::new(m, "Greedy"),
    };
    greedy(&manager).submit();
    greedy(&manager).submit();
}

#[test]
fn manager_recovers_after_caught_merge_panic() {
    let manager = UndoManager::default();
    let greedy = |m: &UndoManager| Greedy {
        metadata: ActionMetadata::new(m, "Greedy"),
    };
    greedy(&manager).submit();
    let second = greedy(&manager);
    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| second.submit()));
    assert!(caught.is_err());

    assert!(manager.is_action_execution_enabled());
    let cell = cell();
    assert!(run(&manager, &cell, 4));
    assert_eq!(cell.get(), 4);
}

// ============================================================================
// Reentrancy
// ============================================================================

#[test]
fn submission_from_delegate_is_rejected() {
    let manager = UndoManager::default();
    let cell = cell();
    let nested = Rc::new(RefCell::new(Vec::new()));

    let weak = manager.downgrade();
    let (hook_cell, hook_results) = (cell.clone(), nested.clone());
    let delegate = ActionDelegate::new().on_execute(move || {
        let Some(m) = weak.upgrade() else { return };
        let inner = SetCell::new(&m, &hook_cell, 100);
        hook_results.borrow_mut().push(inner.submit());
    });

    let mut action = SetCell::new(&manager, &cell, 1);
    action.metadata = ActionMetadata::new(&manager, "Set 1").with_delegate(delegate);
    assert!(action.submit());

    assert_eq!(*nested.borrow(), vec![false]);
    assert_eq!(manager.undo_depth(), 1);
    assert_eq!(cell.get(), 1);
}

#[test]
fn listener_may_purge_during_notification() {
    let manager = UndoManager::default();
    let cell = cell();
    let listener = status_listener(|m: &UndoManager| {
        if m.can_redo() {
            m.purge();
        }
    });
    manager.add_listener(&listener);

    run(&manager, &cell, 1);
    run(&manager, &cell, 2);
    assert!(manager.execute_undo());
    assert!(!manager.can_undo());
    assert!(!manager.can_redo());
}

#[test]
fn manual_disable_suppresses_recording() {
    let manager = UndoManager::default();
    let cell = cell();
    manager.disable_action_execution();
    assert!(!run(&manager, &cell, 1));
    assert_eq!(cell.get(), 0);
    manager.enable_action_execution();
    assert!(run(&manager, &cell, 1));
    assert_eq!(manager.undo_depth(), 1);
}
