#![forbid(unsafe_code)]

//! Editor controls with undo support for the OTM model editors.
//!
//! This crate pairs toolkit-neutral control models with the undo manager
//! from [`otm_undo`]:
//!
//! - [`Property`]: observable value cell the controls are built on.
//! - [`TextField`] and [`Spinner`]: input controls.
//! - [`ValueAction`], [`SpinnerAction`], [`TextFieldAction`]: actions that
//!   record an edit after the user made it.
//! - [`bind_value`], [`bind_spinner`], [`bind_text_field`]: turn every control
//!   edit into a submitted action.
//!
//! # Example
//!
//! ```
//! use otm_controls::{TextField, bind_text_field};
//! use otm_undo::UndoManager;
//!
//! let manager = UndoManager::default();
//! let field = TextField::new("Prof");
//! let _binding = bind_text_field(&field, &manager);
//!
//! field.type_str("ile");
//! assert!(manager.can_undo());
//! manager.execute_undo();
//! assert_eq!(field.text(), "Prof");
//! ```

pub mod actions;
pub mod binding;
pub mod controls;
pub mod property;

pub use actions::{SpinnerAction, TextFieldAction, ValueAction};
pub use binding::{UndoBinding, bind_spinner, bind_text_field, bind_value};
pub use controls::{Spinner, TextField, TextState};
pub use property::{Property, Subscription};
