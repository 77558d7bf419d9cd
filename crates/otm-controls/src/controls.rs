#![forbid(unsafe_code)]

//! Editor controls.
//!
//! Toolkit-neutral models of the two input controls the OTM editors bind to
//! undo: a single-line [`TextField`] and a numeric [`Spinner`]. Each keeps
//! its state in a [`Property`] so undo bindings can observe edits.

use unicode_segmentation::UnicodeSegmentation;

use crate::property::Property;

/// Text plus caret position of a [`TextField`].
///
/// The caret is a grapheme index in `0..=grapheme_count(text)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextState {
    pub text: String,
    pub caret: usize,
}

impl TextState {
    /// State with the caret at the end of `text`.
    #[must_use]
    pub fn at_end(text: impl Into<String>) -> Self {
        let text = text.into();
        let caret = grapheme_count(&text);
        Self { text, caret }
    }

    fn clamped(mut self) -> Self {
        self.caret = self.caret.min(grapheme_count(&self.text));
        self
    }
}

fn grapheme_count(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Byte offset of grapheme `index`, or the text length past the end.
fn byte_offset(text: &str, index: usize) -> usize {
    text.grapheme_indices(true)
        .nth(index)
        .map_or(text.len(), |(offset, _)| offset)
}

/// Single-line text input.
///
/// Cloning shares the same underlying state.
#[derive(Debug, Clone)]
pub struct TextField {
    state: Property<TextState>,
}

impl Default for TextField {
    fn default() -> Self {
        Self::new("")
    }
}

impl TextField {
    /// Create a field holding `text` with the caret at the end.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            state: Property::new(TextState::at_end(text)),
        }
    }

    /// Observable state.
    #[must_use]
    pub fn state(&self) -> &Property<TextState> {
        &self.state
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.state.with(|s| s.text.clone())
    }

    #[must_use]
    pub fn caret(&self) -> usize {
        self.state.with(|s| s.caret)
    }

    /// Replace text and caret in one change. The caret is clamped.
    pub fn set_state(&self, state: TextState) {
        self.state.set(state.clamped());
    }

    /// Move the caret (clamped to the text).
    pub fn set_caret(&self, caret: usize) {
        self.state.update(|s| {
            s.caret = caret.min(grapheme_count(&s.text));
        });
    }

    /// Insert `input` at the caret, as typing or pasting would.
    pub fn type_str(&self, input: &str) {
        if input.is_empty() {
            return;
        }
        self.state.update(|s| {
            let at = byte_offset(&s.text, s.caret);
            s.text.insert_str(at, input);
            s.caret += grapheme_count(input);
        });
    }

    /// Delete the grapheme before the caret. Returns `false` at the start.
    pub fn backspace(&self) -> bool {
        if self.caret() == 0 {
            return false;
        }
        self.state.update(|s| {
            let start = byte_offset(&s.text, s.caret - 1);
            let end = byte_offset(&s.text, s.caret);
            s.text.replace_range(start..end, "");
            s.caret -= 1;
        });
        true
    }

    /// Replace the whole text, caret at the end.
    pub fn replace_all(&self, text: impl Into<String>) {
        self.state.set(TextState::at_end(text));
    }

    /// Whether both handles refer to the same field.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.state.ptr_eq(&other.state)
    }
}

/// Bounded integer input with a step.
#[derive(Debug, Clone)]
pub struct Spinner {
    value: Property<i64>,
    min: i64,
    max: i64,
    step: i64,
}

impl Spinner {
    /// Create a spinner over `min..=max`. Bounds given in the wrong order
    /// are swapped; `initial` is clamped.
    #[must_use]
    pub fn new(min: i64, max: i64, initial: i64, step: i64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            value: Property::new(initial.clamp(min, max)),
            min,
            max,
            step: step.max(1),
        }
    }

    /// Observable value.
    #[must_use]
    pub fn property(&self) -> &Property<i64> {
        &self.value
    }

    #[must_use]
    pub fn value(&self) -> i64 {
        self.value.get()
    }

    #[must_use]
    pub fn min(&self) -> i64 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Whether `value` lies within the spinner's range.
    #[must_use]
    pub fn accepts(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Set the value, clamped to the range.
    pub fn set_value(&self, value: i64) {
        self.value.set(value.clamp(self.min, self.max));
    }

    pub fn increment(&self) {
        self.set_value(self.value().saturating_add(self.step));
    }

    pub fn decrement(&self) {
        self.set_value(self.value().saturating_sub(self.step));
    }

    /// Whether both handles refer to the same spinner value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.value.ptr_eq(&other.value)
    }
}
