#![forbid(unsafe_code)]
//! Opt-in widget state persistence.
//!
//! Most widgets are stateless views over a URI and carry nothing across
//! sessions. A widget that wants its internal state captured in the layout
//! blob implements [`Stateful`] and surfaces it through
//! [`WidgetBehavior::stateful`](crate::widget::WidgetBehavior::stateful).
//!
//! The captured value is opaque JSON. The shell never inspects it; it is
//! stored verbatim inside the widget's slot in the persisted layout and
//! handed back on the next restore.

use serde_json::Value;

/// Capability trait for widgets whose internal state survives a restart.
pub trait Stateful {
    /// Snapshot the widget's internal state.
    ///
    /// Returning `None` means "nothing worth saving right now"; the widget
    /// is then restored with defaults.
    fn store_state(&self) -> Option<Value>;

    /// Reapply a previously captured snapshot.
    ///
    /// The value may come from an older application version. Implementations
    /// must tolerate missing or extra fields rather than fail.
    fn restore_state(&mut self, state: Value);
}
