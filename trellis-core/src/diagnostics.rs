//! Diagnostics
//!
//! Non-fatal, developer-facing warnings. Operations that reject a mutation
//! or are used outside their context never fail; they emit a [`Diagnostic`]
//! and carry on.
//!
//! Every diagnostic is logged with `tracing::warn!` under the
//! `trellis::diagnostics` target. Tests and tooling that need to inspect
//! diagnostics programmatically can collect them with [`capture`].

use std::cell::RefCell;

use tracing::warn;

use crate::value::ObjectKind;

/// A non-fatal warning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    #[error("Set operation on key \"{key}\" failed: target is readonly.")]
    ReadonlySet { key: String },

    #[error("Delete operation on key \"{key}\" failed: target is readonly.")]
    ReadonlyDelete { key: String },

    /// A mutating collection method called through a readonly wrapper.
    #[error("{operation} operation {}failed: target is readonly.", on_key(.key))]
    ReadonlyCollection {
        operation: &'static str,
        key: Option<String>,
    },

    #[error("Set operation on readonly signal failed.")]
    ReadonlySignal,

    #[error("cannot run an inactive scope.")]
    InactiveScope,

    #[error("on_scope_dispose() is called when there is no active scope to be associated with.")]
    NoActiveScope,

    #[error(
        "Reactive {kind} contains both the raw and reactive versions of the same object{}, \
         which can lead to inconsistencies. Avoid differentiating between the raw and reactive \
         versions of an object and only use the reactive version if possible.",
        as_keys(.kind)
    )]
    MixedIdentityKeys { kind: ObjectKind },
}

fn on_key(key: &Option<String>) -> String {
    match key {
        Some(key) => format!("on key \"{key}\" "),
        None => String::new(),
    }
}

fn as_keys(kind: &ObjectKind) -> &'static str {
    if kind.is_keyed() {
        " as keys"
    } else {
        ""
    }
}

thread_local! {
    static LISTENERS: RefCell<Vec<Vec<Diagnostic>>> = const { RefCell::new(Vec::new()) };
}

/// Report a diagnostic.
pub fn emit(diagnostic: Diagnostic) {
    warn!(target: "trellis::diagnostics", "{diagnostic}");
    // Thread-local teardown: nothing is listening anymore.
    let _ = LISTENERS.try_with(|listeners| {
        if let Some(frame) = listeners.borrow_mut().last_mut() {
            frame.push(diagnostic);
        }
    });
}

/// Pops the capture frame even if the closure panics.
struct CaptureFrame;

impl CaptureFrame {
    fn push() -> Self {
        LISTENERS.with(|listeners| listeners.borrow_mut().push(Vec::new()));
        CaptureFrame
    }

    fn finish(self) -> Vec<Diagnostic> {
        let captured = LISTENERS.with(|listeners| listeners.borrow_mut().pop()).unwrap_or_default();
        std::mem::forget(self);
        captured
    }
}

impl Drop for CaptureFrame {
    fn drop(&mut self) {
        let _ = LISTENERS.try_with(|listeners| listeners.borrow_mut().pop());
    }
}

/// Run `f`, collecting every diagnostic it emits on this thread.
///
/// Captures nest: an inner capture sees only its own diagnostics, and they
/// are not forwarded to the outer one.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<Diagnostic>) {
    let frame = CaptureFrame::push();
    let result = f();
    (result, frame.finish())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_collects_emitted_diagnostics() {
        let ((), captured) = capture(|| {
            emit(Diagnostic::InactiveScope);
            emit(Diagnostic::NoActiveScope);
        });
        assert_eq!(captured, vec![Diagnostic::InactiveScope, Diagnostic::NoActiveScope]);
    }

    #[test]
    fn nested_captures_are_isolated() {
        let (inner, outer) = capture(|| {
            emit(Diagnostic::InactiveScope);
            let ((), inner) = capture(|| emit(Diagnostic::ReadonlySignal));
            inner
        });
        assert_eq!(inner, vec![Diagnostic::ReadonlySignal]);
        assert_eq!(outer, vec![Diagnostic::InactiveScope]);
    }

    #[test]
    fn emit_without_listener_is_harmless() {
        emit(Diagnostic::ReadonlySignal);
    }

    #[test]
    fn messages_name_the_key() {
        let message = Diagnostic::ReadonlySet { key: "foo".into() }.to_string();
        assert_eq!(message, "Set operation on key \"foo\" failed: target is readonly.");

        let message = Diagnostic::ReadonlyCollection { operation: "Clear", key: None }.to_string();
        assert_eq!(message, "Clear operation failed: target is readonly.");

        let message = Diagnostic::MixedIdentityKeys { kind: ObjectKind::Map }.to_string();
        assert!(message.starts_with("Reactive Map contains both"));
        assert!(message.contains("object as keys,"));
    }
}
