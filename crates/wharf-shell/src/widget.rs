#![forbid(unsafe_code)]
//! Widget handles and the widget behavior contract.
//!
//! A widget is shared state (id, URI, title, flags, event emitters) plus a
//! boxed [`WidgetBehavior`] that draws it and optionally persists state.
//! [`WidgetHandle`] is the cheap-to-clone owner-side handle; every subsystem
//! that holds a widget holds one of these. [`WeakWidgetHandle`] is for
//! listeners that must not keep a disposed widget alive.
//!
//! # Invariants
//!
//! | # | Invariant |
//! |---|-----------|
//! | 1 | `dispose` is idempotent; `on_dispose` fires exactly once. |
//! | 2 | Visibility events fire only on an actual flag change. |
//! | 3 | A disposed widget ignores `show`, `hide` and `activate`. |
//! | 4 | The behavior lock recovers from poisoning so one panicking `render` does not brick the widget. |
//!
//! # Failure Modes
//!
//! | Failure | Handling |
//! |---------|----------|
//! | behavior `init` fails | creation aborts, error propagates to every waiter |
//! | behavior `render` panics | caught by the view renderer's error boundary |

use crate::area::Area;
use crate::error::WidgetError;
use crate::stateful::Stateful;
use crate::sync::lock;
use bitflags::bitflags;
use futures_util::future::{self, BoxFuture};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use wharf_core::{Emitter, Rect, Surface, Uri};

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Stable widget identifier.
///
/// Widget ids are derived from URIs by the widget manager (the URI with its
/// query stripped, unless the owning factory overrides the derivation), so
/// two opens of the same document with different open options share one id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(String);

impl WidgetId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        WidgetId(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WidgetId {
    fn from(id: &str) -> Self {
        WidgetId(id.to_owned())
    }
}

impl From<String> for WidgetId {
    fn from(id: String) -> Self {
        WidgetId(id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flags and title
// ─────────────────────────────────────────────────────────────────────────────

bitflags! {
    /// Lifecycle flags for a widget.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WidgetFlags: u8 {
        /// The widget sits somewhere in the shell's region tree.
        const ATTACHED = 1 << 0;
        /// The widget is currently shown (its region is expanded and it is
        /// the selected tab, for tabbed regions).
        const VISIBLE = 1 << 1;
        /// The widget has been disposed and must not be reused.
        const DISPOSED = 1 << 2;
        /// The shell has installed its lifecycle listeners. Bookkeeping bit
        /// so tracking is installed at most once per widget.
        const TRACKED = 1 << 3;
        /// A state-capture-on-dispose hook is installed. Bookkeeping bit.
        const PERSIST_HOOKED = 1 << 4;
    }
}

/// Tab title of a widget.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Title {
    pub label: String,
    pub icon: Option<String>,
    pub caption: String,
    /// Shown with an unsaved-changes marker instead of the close button.
    pub saving: bool,
    pub closable: bool,
}

impl Title {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Title {
            label: label.into(),
            closable: true,
            ..Title::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Behavior contract
// ─────────────────────────────────────────────────────────────────────────────

/// What a concrete widget does: one-time setup, drawing, and optional state
/// persistence.
///
/// Behaviors run behind a lock inside [`WidgetHandle`]; they never see
/// concurrent calls. `init` runs exactly once, before the handle exists, so
/// it may hold `&mut self` across awaits freely.
pub trait WidgetBehavior: Send {
    /// One-time asynchronous setup. Runs after the factory produced the
    /// behavior and before the widget becomes visible anywhere.
    fn init<'a>(&'a mut self, uri: &'a Uri) -> BoxFuture<'a, Result<(), WidgetError>> {
        let _ = uri;
        Box::pin(future::ready(Ok(())))
    }

    /// Initial tab title. `None` falls back to the display name of the
    /// widget's URI.
    fn title(&self) -> Option<Title> {
        None
    }

    /// Draw the widget into `area` of `surface`. Must not panic for
    /// degenerate (including empty) areas.
    fn render(&self, area: Rect, surface: &mut Surface);

    /// Opt in to layout-blob state persistence.
    fn stateful(&mut self) -> Option<&mut dyn Stateful> {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Event emitters carried by every widget.
pub struct WidgetEvents {
    /// Title or content metadata changed.
    pub on_update: Emitter<()>,
    /// The widget was activated (focused).
    pub on_activate: Emitter<()>,
    /// Visibility flag changed; payload is the new visibility.
    pub on_visibility: Emitter<bool>,
    /// The widget is being disposed. Fires exactly once.
    pub on_dispose: Emitter<()>,
}

impl WidgetEvents {
    fn new() -> Self {
        WidgetEvents {
            on_update: Emitter::new(),
            on_activate: Emitter::new(),
            on_visibility: Emitter::new(),
            on_dispose: Emitter::new(),
        }
    }
}

struct WidgetCore {
    id: Mutex<Option<WidgetId>>,
    uri: Mutex<Option<Uri>>,
    title: Mutex<Title>,
    flags: Mutex<WidgetFlags>,
    parent_area: Mutex<Option<Area>>,
    behavior: Mutex<Box<dyn WidgetBehavior>>,
    events: WidgetEvents,
}

/// Cheap-to-clone shared handle to one widget.
#[derive(Clone)]
pub struct WidgetHandle {
    core: Arc<WidgetCore>,
}

impl WidgetHandle {
    /// Wrap a behavior without an id. The widget cannot be attached to the
    /// shell until an id is assigned.
    #[must_use]
    pub fn new(behavior: Box<dyn WidgetBehavior>) -> Self {
        Self::build(None, None, behavior)
    }

    /// Wrap a behavior with its identity already resolved. This is the path
    /// the widget manager takes after a factory produced the behavior.
    #[must_use]
    pub fn with_id(id: WidgetId, uri: Uri, behavior: Box<dyn WidgetBehavior>) -> Self {
        Self::build(Some(id), Some(uri), behavior)
    }

    fn build(id: Option<WidgetId>, uri: Option<Uri>, behavior: Box<dyn WidgetBehavior>) -> Self {
        WidgetHandle {
            core: Arc::new(WidgetCore {
                id: Mutex::new(id),
                uri: Mutex::new(uri),
                title: Mutex::new(Title::default()),
                flags: Mutex::new(WidgetFlags::empty()),
                parent_area: Mutex::new(None),
                behavior: Mutex::new(behavior),
                events: WidgetEvents::new(),
            }),
        }
    }

    // --- Identity ---

    #[must_use]
    pub fn id(&self) -> Option<WidgetId> {
        lock(&self.core.id).clone()
    }

    pub fn set_id(&self, id: WidgetId) {
        *lock(&self.core.id) = Some(id);
    }

    #[must_use]
    pub fn uri(&self) -> Option<Uri> {
        lock(&self.core.uri).clone()
    }

    pub fn set_uri(&self, uri: Uri) {
        *lock(&self.core.uri) = Some(uri);
    }

    // --- Title ---

    #[must_use]
    pub fn title(&self) -> Title {
        lock(&self.core.title).clone()
    }

    /// Mutate the title in place and fire `on_update`.
    pub fn update_title(&self, f: impl FnOnce(&mut Title)) {
        {
            let mut title = lock(&self.core.title);
            f(&mut title);
        }
        self.core.events.on_update.fire(&());
    }

    // --- Flags ---

    #[must_use]
    pub fn flags(&self) -> WidgetFlags {
        *lock(&self.core.flags)
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.flags().contains(WidgetFlags::DISPOSED)
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.flags().contains(WidgetFlags::VISIBLE)
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.flags().contains(WidgetFlags::ATTACHED)
    }

    pub(crate) fn set_flag(&self, flag: WidgetFlags, on: bool) {
        lock(&self.core.flags).set(flag, on);
    }

    /// Test-and-set for bookkeeping flags. Returns whether the flag was
    /// already set.
    pub(crate) fn mark(&self, flag: WidgetFlags) -> bool {
        let mut flags = lock(&self.core.flags);
        let was = flags.contains(flag);
        flags.insert(flag);
        was
    }

    #[must_use]
    pub fn parent_area(&self) -> Option<Area> {
        *lock(&self.core.parent_area)
    }

    pub(crate) fn set_parent_area(&self, area: Option<Area>) {
        *lock(&self.core.parent_area) = area;
    }

    // --- Lifecycle ---

    pub fn show(&self) {
        self.set_visible(true)
    }

    pub fn hide(&self) {
        self.set_visible(false)
    }

    fn set_visible(&self, visible: bool) {
        let changed = {
            let mut flags = lock(&self.core.flags);
            if flags.contains(WidgetFlags::DISPOSED) {
                return;
            }
            if flags.contains(WidgetFlags::VISIBLE) == visible {
                false
            } else {
                flags.set(WidgetFlags::VISIBLE, visible);
                true
            }
        };
        if changed {
            self.core.events.on_visibility.fire(&visible);
        }
    }

    /// Fire the activation event. The shell's tracking listener turns this
    /// into the current-widget change.
    pub fn activate(&self) {
        if self.is_disposed() {
            return;
        }
        self.core.events.on_activate.fire(&());
    }

    /// Dispose the widget. Idempotent; listeners fire on the first call
    /// only. Containers listen on `on_dispose` to detach the widget, so
    /// after this returns the widget is gone from the layout.
    pub fn dispose(&self) {
        {
            let mut flags = lock(&self.core.flags);
            if flags.contains(WidgetFlags::DISPOSED) {
                return;
            }
            flags.insert(WidgetFlags::DISPOSED);
            flags.remove(WidgetFlags::ATTACHED | WidgetFlags::VISIBLE);
        }
        self.core.events.on_dispose.fire(&());
    }

    #[must_use]
    pub fn events(&self) -> &WidgetEvents {
        &self.core.events
    }

    // --- Behavior access ---

    /// Draw the widget. Callers that need panic isolation go through the
    /// view renderer instead of calling this directly.
    pub fn render(&self, area: Rect, surface: &mut Surface) {
        let behavior = lock(&self.core.behavior);
        behavior.render(area, surface);
    }

    /// Snapshot the behavior's persistable state, if it has any.
    #[must_use]
    pub fn store_state(&self) -> Option<Value> {
        let mut behavior = lock(&self.core.behavior);
        behavior.stateful().and_then(|s| s.store_state())
    }

    /// Hand a previously captured snapshot back to the behavior.
    pub fn restore_state(&self, state: Value) {
        let mut behavior = lock(&self.core.behavior);
        if let Some(stateful) = behavior.stateful() {
            stateful.restore_state(state);
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakWidgetHandle {
        WeakWidgetHandle {
            core: Arc::downgrade(&self.core),
        }
    }
}

impl fmt::Debug for WidgetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetHandle")
            .field("id", &self.id())
            .field("flags", &self.flags())
            .finish()
    }
}

impl PartialEq for WidgetHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for WidgetHandle {}

/// Non-owning widget reference for lifecycle listeners.
#[derive(Clone)]
pub struct WeakWidgetHandle {
    core: Weak<WidgetCore>,
}

impl WeakWidgetHandle {
    #[must_use]
    pub fn upgrade(&self) -> Option<WidgetHandle> {
        self.core.upgrade().map(|core| WidgetHandle { core })
    }
}

impl fmt::Debug for WeakWidgetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakWidgetHandle")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Blank;

    impl WidgetBehavior for Blank {
        fn render(&self, _area: Rect, _surface: &mut Surface) {}
    }

    struct Counter {
        count: u32,
    }

    impl Stateful for Counter {
        fn store_state(&self) -> Option<Value> {
            Some(json!({ "count": self.count }))
        }

        fn restore_state(&mut self, state: Value) {
            if let Some(count) = state.get("count").and_then(Value::as_u64) {
                self.count = count as u32;
            }
        }
    }

    impl WidgetBehavior for Counter {
        fn render(&self, _area: Rect, _surface: &mut Surface) {}

        fn stateful(&mut self) -> Option<&mut dyn Stateful> {
            Some(self)
        }
    }

    fn widget() -> WidgetHandle {
        WidgetHandle::with_id(
            WidgetId::from("test:/w"),
            Uri::parse("test:/w").unwrap(),
            Box::new(Blank),
        )
    }

    #[test]
    fn dispose_fires_exactly_once() {
        let w = widget();
        let fired = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&fired);
        let _sub = w.events().on_dispose.subscribe(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        w.dispose();
        w.dispose();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(w.is_disposed());
        assert!(!w.is_attached());
    }

    #[test]
    fn visibility_fires_only_on_change() {
        let w = widget();
        let fired = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&fired);
        let _sub = w.events().on_visibility.subscribe(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        w.show();
        w.show();
        w.hide();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disposed_widget_ignores_lifecycle_calls() {
        let w = widget();
        w.dispose();

        let fired = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&fired);
        let _sub = w.events().on_activate.subscribe(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        w.show();
        w.activate();
        assert!(!w.is_visible());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn title_update_fires_update_event() {
        let w = widget();
        let fired = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&fired);
        let _sub = w.events().on_update.subscribe(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        w.update_title(|t| t.label = "Notes".into());
        assert_eq!(w.title().label, "Notes");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn state_round_trips_through_the_handle() {
        let w = WidgetHandle::with_id(
            WidgetId::from("test:/c"),
            Uri::parse("test:/c").unwrap(),
            Box::new(Counter { count: 7 }),
        );

        let state = w.store_state().unwrap();
        assert_eq!(state["count"], 7);

        w.restore_state(json!({ "count": 42 }));
        assert_eq!(w.store_state().unwrap()["count"], 42);
    }

    #[test]
    fn stateless_widget_stores_nothing() {
        let w = widget();
        assert!(w.store_state().is_none());
        // Restoring into a stateless widget is a no-op, not a panic.
        w.restore_state(json!({ "anything": 1 }));
    }

    #[test]
    fn mark_is_test_and_set() {
        let w = widget();
        assert!(!w.mark(WidgetFlags::TRACKED));
        assert!(w.mark(WidgetFlags::TRACKED));
    }

    #[test]
    fn weak_handle_drops_with_the_widget() {
        let w = widget();
        let weak = w.downgrade();
        assert!(weak.upgrade().is_some());
        drop(w);
        assert!(weak.upgrade().is_none());
    }
}
