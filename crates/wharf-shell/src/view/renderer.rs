#![forbid(unsafe_code)]
//! Widget rendering with per-widget error isolation.
//!
//! Every widget renders through a portal binding registered here. The
//! actual `render` call runs inside a panic boundary: a widget whose
//! renderer panics is latched as failed and replaced by the fallback
//! renderer on this and every following frame, until its portal is
//! remounted. One broken widget never takes down the rest of the shell.

use crate::sync::lock;
use crate::widget::{WidgetHandle, WidgetId};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};
use wharf_core::{Rect, Surface};

/// Host-supplied replacement drawing for a failed widget.
pub type FallbackRender = Arc<dyn Fn(&CapturedError, Rect, &mut Surface) + Send + Sync>;

/// A panic captured from a widget's `render`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedError {
    pub widget_id: WidgetId,
    pub message: String,
}

struct RendererInner {
    portals: Mutex<HashMap<WidgetId, WidgetHandle>>,
    failures: Mutex<HashMap<WidgetId, CapturedError>>,
    fallback: Mutex<FallbackRender>,
}

/// Portal registry plus render error boundary. Cheap to clone.
#[derive(Clone)]
pub struct ViewRenderer {
    inner: Arc<RendererInner>,
}

impl Default for ViewRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRenderer {
    #[must_use]
    pub fn new() -> Self {
        ViewRenderer {
            inner: Arc::new(RendererInner {
                portals: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                fallback: Mutex::new(Arc::new(default_fallback)),
            }),
        }
    }

    /// Replace the fallback renderer used for failed widgets.
    pub fn set_fallback(&self, fallback: FallbackRender) {
        *lock(&self.inner.fallback) = fallback;
    }

    /// Register a portal for the widget. Remounting clears any latched
    /// failure, giving the widget a fresh start. Returns `false` for
    /// widgets without an id.
    pub fn mount(&self, widget: &WidgetHandle) -> bool {
        let Some(id) = widget.id() else {
            warn!("cannot mount a widget without an id");
            return false;
        };
        lock(&self.inner.failures).remove(&id);
        let already = lock(&self.inner.portals)
            .insert(id.clone(), widget.clone())
            .is_some();
        if !already {
            let weak_inner = Arc::downgrade(&self.inner);
            let gone = id.clone();
            widget
                .events()
                .on_dispose
                .subscribe(move |_| {
                    if let Some(inner) = weak_inner.upgrade() {
                        ViewRenderer { inner }.unmount(&gone);
                    }
                })
                .detach();
        }
        true
    }

    /// Drop the portal and any latched failure.
    pub fn unmount(&self, id: &WidgetId) {
        lock(&self.inner.portals).remove(id);
        lock(&self.inner.failures).remove(id);
    }

    #[must_use]
    pub fn has_portal(&self, id: &WidgetId) -> bool {
        lock(&self.inner.portals).contains_key(id)
    }

    /// Ids of all currently latched failures.
    #[must_use]
    pub fn failed_widgets(&self) -> Vec<CapturedError> {
        lock(&self.inner.failures).values().cloned().collect()
    }

    /// Draw one widget into its area. Returns whether anything was drawn.
    ///
    /// A panic inside the widget's `render` is captured here: the widget
    /// is latched as failed and the fallback is drawn instead, now and on
    /// every later frame until [`mount`](Self::mount) is called again.
    pub fn render_widget(&self, widget: &WidgetHandle, area: Rect, surface: &mut Surface) -> bool {
        let Some(id) = widget.id() else {
            return false;
        };
        if !self.has_portal(&id) {
            debug!(widget = %id, "no portal mounted, skipping render");
            return false;
        }
        if widget.is_disposed() {
            self.unmount(&id);
            return false;
        }

        if let Some(captured) = lock(&self.inner.failures).get(&id).cloned() {
            let fallback = lock(&self.inner.fallback).clone();
            fallback(&captured, area, surface);
            return true;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| widget.render(area, surface)));
        match outcome {
            Ok(()) => true,
            Err(payload) => {
                let captured = CapturedError {
                    widget_id: id.clone(),
                    message: panic_message(payload.as_ref()),
                };
                error!(widget = %id, message = %captured.message, "widget render panicked");
                lock(&self.inner.failures).insert(id, captured.clone());
                let fallback = lock(&self.inner.fallback).clone();
                fallback(&captured, area, surface);
                true
            }
        }
    }
}

fn default_fallback(err: &CapturedError, area: Rect, surface: &mut Surface) {
    let line = format!("widget '{}' failed: {}", err.widget_id, err.message);
    surface.put_str(area, area.x, area.y, &line);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::WidgetBehavior;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wharf_core::Uri;

    struct Exploding {
        calls: Arc<AtomicUsize>,
    }

    impl WidgetBehavior for Exploding {
        fn render(&self, _area: Rect, _surface: &mut Surface) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("boom");
        }
    }

    struct Labeled(&'static str);
    impl WidgetBehavior for Labeled {
        fn render(&self, area: Rect, surface: &mut Surface) {
            surface.put_str(area, area.x, area.y, self.0);
        }
    }

    fn widget(name: &str, behavior: Box<dyn WidgetBehavior>) -> WidgetHandle {
        WidgetHandle::with_id(
            WidgetId::new(format!("t:///{name}")),
            Uri::parse(&format!("t:///{name}")).unwrap(),
            behavior,
        )
    }

    #[test]
    fn panic_is_latched_and_fallback_drawn() {
        let renderer = ViewRenderer::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let w = widget("bomb", Box::new(Exploding { calls: Arc::clone(&calls) }));
        assert!(renderer.mount(&w));

        let area = Rect::new(0, 0, 60, 4);
        let mut surface = Surface::new(60, 4);
        assert!(renderer.render_widget(&w, area, &mut surface));
        assert!(surface.row_text(0).contains("t:///bomb"));
        assert!(surface.row_text(0).contains("boom"));

        // The failure latches; the behavior is not called again.
        assert!(renderer.render_widget(&w, area, &mut surface));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.failed_widgets().len(), 1);
    }

    #[test]
    fn remount_resets_the_boundary() {
        let renderer = ViewRenderer::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let w = widget("bomb", Box::new(Exploding { calls: Arc::clone(&calls) }));
        renderer.mount(&w);

        let area = Rect::new(0, 0, 40, 2);
        let mut surface = Surface::new(40, 2);
        renderer.render_widget(&w, area, &mut surface);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        renderer.mount(&w);
        assert!(renderer.failed_widgets().is_empty());
        renderer.render_widget(&w, area, &mut surface);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unmounted_widget_is_skipped() {
        let renderer = ViewRenderer::new();
        let w = widget("plain", Box::new(Labeled("hi")));
        let mut surface = Surface::new(20, 2);
        assert!(!renderer.render_widget(&w, Rect::new(0, 0, 20, 2), &mut surface));
        assert_eq!(surface.row_text(0), "");
    }

    #[test]
    fn dispose_unmounts_the_portal() {
        let renderer = ViewRenderer::new();
        let w = widget("gone", Box::new(Labeled("x")));
        renderer.mount(&w);
        assert!(renderer.has_portal(&w.id().unwrap()));

        w.dispose();
        assert!(!renderer.has_portal(&WidgetId::new("t:///gone")));
    }

    #[test]
    fn custom_fallback_is_used() {
        let renderer = ViewRenderer::new();
        renderer.set_fallback(Arc::new(|_err, area, surface: &mut Surface| {
            surface.put_str(area, area.x, area.y, "(unavailable)");
        }));
        let w = widget(
            "bomb",
            Box::new(Exploding {
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        );
        renderer.mount(&w);

        let mut surface = Surface::new(30, 2);
        renderer.render_widget(&w, Rect::new(0, 0, 30, 2), &mut surface);
        assert_eq!(surface.row_text(0), "(unavailable)");
    }

    #[test]
    fn healthy_widget_renders_through() {
        let renderer = ViewRenderer::new();
        let w = widget("plain", Box::new(Labeled("hello")));
        renderer.mount(&w);

        let mut surface = Surface::new(20, 2);
        assert!(renderer.render_widget(&w, Rect::new(0, 0, 20, 2), &mut surface));
        assert_eq!(surface.row_text(0), "hello");
    }
}
