#![forbid(unsafe_code)]

//! Undo actions for control edits.
//!
//! These actions record edits the user has already made. Each one is built
//! from the value before the edit and whatever the control holds now, so
//! `do_execute` changes nothing and only reports whether the value actually
//! changed. Undo and redo restore the recorded values directly, after
//! checking that the control still holds what the action expects.

use std::any::Any;
use std::fmt;

use otm_undo::{
    ActionDelegate, ActionError, ActionMetadata, ActionResult, MergePolicy, UndoManager,
    UndoableAction,
};
use web_time::Instant;

use crate::controls::{Spinner, TextField, TextState};
use crate::property::Property;

fn drift(expected: &dyn fmt::Debug, actual: &dyn fmt::Debug) -> ActionError {
    ActionError::StateDrift {
        expected: format!("{expected:?}"),
        actual: format!("{actual:?}"),
    }
}

// ============================================================================
// Generic value
// ============================================================================

/// Change of a generic [`Property`] value.
pub struct ValueAction<T> {
    metadata: ActionMetadata,
    property: Property<T>,
    old: T,
    new: T,
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> ValueAction<T> {
    /// Record the change of `property` from `old` to its current value.
    #[must_use]
    pub fn new(
        manager: &UndoManager,
        property: &Property<T>,
        old: T,
        description: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ActionMetadata::new(manager, description),
            property: property.clone(),
            new: property.get(),
            old,
        }
    }

    #[must_use]
    pub fn with_delegate(mut self, delegate: ActionDelegate) -> Self {
        self.metadata = self.metadata.with_delegate(delegate);
        self
    }

    #[must_use]
    pub fn old_value(&self) -> &T {
        &self.old
    }

    #[must_use]
    pub fn new_value(&self) -> &T {
        &self.new
    }

    fn restore(&self, expected: &T, value: &T) -> ActionResult {
        let current = self.property.get();
        if current != *expected {
            return Err(drift(expected, &current));
        }
        self.property.set(value.clone());
        Ok(true)
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> UndoableAction for ValueAction<T> {
    fn do_execute(&mut self) -> ActionResult {
        Ok(self.old != self.new)
    }

    fn do_execute_undo(&mut self) -> ActionResult {
        self.restore(&self.new, &self.old)
    }

    fn do_execute_redo(&mut self) -> ActionResult {
        self.restore(&self.old, &self.new)
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

    fn debug_name(&self) -> &'static str {
        "ValueAction"
    }
}

// ============================================================================
// Spinner
// ============================================================================

/// Change of a [`Spinner`] value.
pub struct SpinnerAction {
    metadata: ActionMetadata,
    spinner: Spinner,
    old: i64,
    new: i64,
}

impl SpinnerAction {
    /// Record the change of `spinner` from `old` to its current value.
    #[must_use]
    pub fn new(manager: &UndoManager, spinner: &Spinner, old: i64) -> Self {
        Self {
            metadata: ActionMetadata::new(manager, "Change value"),
            spinner: spinner.clone(),
            new: spinner.value(),
            old,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    #[must_use]
    pub fn with_delegate(mut self, delegate: ActionDelegate) -> Self {
        self.metadata = self.metadata.with_delegate(delegate);
        self
    }

    fn restore(&self, expected: i64, value: i64) -> ActionResult {
        let current = self.spinner.value();
        if current != expected {
            return Err(drift(&expected, &current));
        }
        if !self.spinner.accepts(value) {
            return Err(ActionError::InvalidState(format!(
                "{value} outside spinner range {}..={}",
                self.spinner.min(),
                self.spinner.max()
            )));
        }
        self.spinner.set_value(value);
        Ok(true)
    }
}

impl UndoableAction for SpinnerAction {
    fn do_execute(&mut self) -> ActionResult {
        Ok(self.old != self.new)
    }

    fn do_execute_undo(&mut self) -> ActionResult {
        self.restore(self.new, self.old)
    }

    fn do_execute_redo(&mut self) -> ActionResult {
        self.restore(self.old, self.new)
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

    fn debug_name(&self) -> &'static str {
        "SpinnerAction"
    }
}

// ============================================================================
// Text field
// ============================================================================

/// Text edit in a [`TextField`], including the caret position.
///
/// Consecutive edits of the same field merge into one undo step while they
/// arrive within the manager's merge pause and no undo or redo has happened
/// in between. An edit that does not start from the text the previous step
/// left behind is never merged.
pub struct TextFieldAction {
    metadata: ActionMetadata,
    field: TextField,
    old: TextState,
    new: TextState,
    policy: MergePolicy,
}

impl TextFieldAction {
    /// Record the edit of `field` from `old` to its current state. The merge
    /// window is taken from the manager's configuration.
    #[must_use]
    pub fn new(manager: &UndoManager, field: &TextField, old: TextState) -> Self {
        Self {
            metadata: ActionMetadata::new(manager, "Edit text"),
            field: field.clone(),
            new: field.state().get(),
            old,
            policy: manager.config().merge_policy(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    #[must_use]
    pub fn with_delegate(mut self, delegate: ActionDelegate) -> Self {
        self.metadata = self.metadata.with_delegate(delegate);
        self
    }

    #[must_use]
    pub fn old_state(&self) -> &TextState {
        &self.old
    }

    #[must_use]
    pub fn new_state(&self) -> &TextState {
        &self.new
    }

    fn restore(&self, expected: &TextState, target: &TextState) -> ActionResult {
        // Caret moves are not recorded, so only the text must match.
        let current = self.field.text();
        if current != expected.text {
            return Err(drift(&expected.text, &current));
        }
        self.field.set_state(target.clone());
        Ok(true)
    }
}

impl UndoableAction for TextFieldAction {
    fn do_execute(&mut self) -> ActionResult {
        Ok(self.old.text != self.new.text)
    }

    fn do_execute_undo(&mut self) -> ActionResult {
        self.restore(&self.new, &self.old)
    }

    fn do_execute_redo(&mut self) -> ActionResult {
        self.restore(&self.old, &self.new)
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
        if !self.field.ptr_eq(&other.field) {
            return false;
        }
        // Must be consecutive: an unrecorded change in between would be lost.
        if other.old.text != self.new.text {
            return false;
        }
        let now = other.metadata.last_executed().unwrap_or_else(Instant::now);
        self.policy.allows(&self.metadata, now)
    }

    fn merge(&mut self, candidate: &dyn UndoableAction) -> Result<(), ActionError> {
        let Some(other) = candidate.as_any().downcast_ref::<Self>() else {
            return Err(ActionError::InvalidState(format!(
                "cannot merge {} into TextFieldAction",
                candidate.debug_name()
            )));
        };
        self.new = other.new.clone();
        self.metadata.touch();
        Ok(())
    }

    fn debug_name(&self) -> &'static str {
        "TextFieldAction"
    }
}
