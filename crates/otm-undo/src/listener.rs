#![forbid(unsafe_code)]

//! Undo status listeners.
//!
//! Listeners are told whenever `can_undo()` or `can_redo()` flips, which is
//! what menu items and toolbar buttons need to enable or disable
//! themselves. The manager holds listeners weakly: whoever registers a
//! listener keeps the `Rc` alive, and a dropped listener simply stops being
//! called.

use std::rc::{Rc, Weak};

use crate::manager::UndoManager;

/// Observer of undo/redo availability.
pub trait UndoStatusListener {
    /// Called synchronously after an operation changed `can_undo()` or
    /// `can_redo()`.
    fn on_undo_status_changed(&self, manager: &UndoManager);
}

impl<F> UndoStatusListener for F
where
    F: Fn(&UndoManager),
{
    fn on_undo_status_changed(&self, manager: &UndoManager) {
        self(manager)
    }
}

/// Wrap a closure as a shareable listener handle.
pub fn status_listener<F>(f: F) -> Rc<dyn UndoStatusListener>
where
    F: Fn(&UndoManager) + 'static,
{
    Rc::new(f)
}

/// Registered listeners in registration order, compared by identity.
#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: Vec<Weak<dyn UndoStatusListener>>,
}

fn identity(ptr: *const dyn UndoStatusListener) -> *const () {
    ptr as *const ()
}

impl ListenerSet {
    /// Register `listener`. Returns `false` if it was already registered.
    pub(crate) fn add(&mut self, listener: &Rc<dyn UndoStatusListener>) -> bool {
        let key = identity(Rc::as_ptr(listener));
        if self
            .entries
            .iter()
            .any(|w| w.strong_count() > 0 && identity(w.as_ptr()) == key)
        {
            return false;
        }
        self.entries.push(Rc::downgrade(listener));
        true
    }

    /// Unregister `listener`. Returns `false` if it was not registered.
    pub(crate) fn remove(&mut self, listener: &Rc<dyn UndoStatusListener>) -> bool {
        let key = identity(Rc::as_ptr(listener));
        let before = self.entries.len();
        self.entries.retain(|w| identity(w.as_ptr()) != key);
        self.entries.len() != before
    }

    /// Prune dead entries and return the live listeners.
    pub(crate) fn live(&mut self) -> Vec<Rc<dyn UndoStatusListener>> {
        self.entries.retain(|w| w.strong_count() > 0);
        self.entries.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
