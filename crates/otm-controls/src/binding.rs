#![forbid(unsafe_code)]

//! Glue between controls and an [`UndoManager`].
//!
//! A binding subscribes to a control and remembers the last value it saw.
//! Each change becomes an action built from (last seen, current) and is
//! submitted to the manager. Changes made while the manager refuses actions
//! (during its own undo/redo, or while execution is disabled) still advance
//! the snapshot, so the next user edit starts from the right value.
//!
//! Bindings hold the manager weakly; a binding outliving its manager simply
//! stops recording.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use otm_undo::{UndoManager, UndoableAction, WeakUndoManager};

use crate::actions::{SpinnerAction, TextFieldAction, ValueAction};
use crate::controls::{Spinner, TextField};
use crate::property::{Property, Subscription};

/// Live connection between one control and a manager.
///
/// Dropping the binding unsubscribes.
#[must_use = "dropping the binding stops undo recording"]
pub struct UndoBinding {
    _subscription: Subscription,
    label: &'static str,
}

impl fmt::Debug for UndoBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoBinding")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Manager to submit to, or `None` when the change must not be recorded.
fn accepting(manager: &WeakUndoManager) -> Option<UndoManager> {
    let manager = manager.upgrade()?;
    if !manager.is_action_execution_enabled() {
        tracing::trace!(target: "otm.controls", "change not recorded: execution disabled");
        return None;
    }
    Some(manager)
}

/// Record every change of `property` as a [`ValueAction`].
pub fn bind_value<T>(
    property: &Property<T>,
    manager: &UndoManager,
    description: impl Into<String>,
) -> UndoBinding
where
    T: Clone + PartialEq + fmt::Debug + 'static,
{
    let snapshot = Rc::new(RefCell::new(property.get()));
    let weak = manager.downgrade();
    let description = description.into();
    let target = property.clone();

    let subscription = property.subscribe(move |value: &T| {
        let previous = snapshot.replace(value.clone());
        let Some(manager) = accepting(&weak) else {
            return;
        };
        ValueAction::new(&manager, &target, previous, description.clone()).submit();
    });

    UndoBinding {
        _subscription: subscription,
        label: "value",
    }
}

/// Record every value change of `spinner` as a [`SpinnerAction`].
pub fn bind_spinner(spinner: &Spinner, manager: &UndoManager) -> UndoBinding {
    let snapshot = Rc::new(RefCell::new(spinner.value()));
    let weak = manager.downgrade();
    let target = spinner.clone();

    let subscription = spinner.property().subscribe(move |value: &i64| {
        let previous = snapshot.replace(*value);
        let Some(manager) = accepting(&weak) else {
            return;
        };
        SpinnerAction::new(&manager, &target, previous).submit();
    });

    UndoBinding {
        _subscription: subscription,
        label: "spinner",
    }
}

/// Record every text edit of `field` as a [`TextFieldAction`].
///
/// Caret-only moves update the snapshot but are not recorded.
pub fn bind_text_field(field: &TextField, manager: &UndoManager) -> UndoBinding {
    let snapshot = Rc::new(RefCell::new(field.state().get()));
    let weak = manager.downgrade();
    let target = field.clone();

    let subscription = field.state().subscribe(move |state| {
        let previous = snapshot.replace(state.clone());
        if previous.text == state.text {
            return;
        }
        let Some(manager) = accepting(&weak) else {
            return;
        };
        TextFieldAction::new(&manager, &target, previous).submit();
    });

    UndoBinding {
        _subscription: subscription,
        label: "text field",
    }
}
