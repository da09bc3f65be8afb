#![forbid(unsafe_code)]
//! Deferred hover popups.
//!
//! A hover request does not show immediately: it counts down a number of
//! frame ticks first, so sweeping the pointer across many targets shows
//! nothing. A request for a different target while one is pending replaces
//! it and restarts the countdown; this replacement is the hover system's
//! one cancellation point. A request for the same target leaves the
//! running countdown (or the already visible popup) alone.

use crate::sync::lock;
use crate::widget::WidgetId;
use std::sync::{Arc, Mutex};
use tracing::trace;
use wharf_core::{Emitter, Rect, Surface};

/// What to show, for whom, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverRequest {
    pub target: WidgetId,
    pub content: String,
    /// Cell the popup anchors to, in root coordinates.
    pub anchor: (u16, u16),
}

struct PendingHover {
    request: HoverRequest,
    remaining: u32,
}

struct HoverState {
    pending: Option<PendingHover>,
    active: Option<HoverRequest>,
}

struct HoverInner {
    delay_ticks: u32,
    state: Mutex<HoverState>,
    on_did_show: Emitter<HoverRequest>,
    on_did_hide: Emitter<()>,
}

/// Debounced hover scheduling. Cheap to clone.
#[derive(Clone)]
pub struct HoverService {
    inner: Arc<HoverInner>,
}

impl HoverService {
    #[must_use]
    pub fn new(delay_ticks: u32) -> Self {
        HoverService {
            inner: Arc::new(HoverInner {
                delay_ticks,
                state: Mutex::new(HoverState {
                    pending: None,
                    active: None,
                }),
                on_did_show: Emitter::new(),
                on_did_hide: Emitter::new(),
            }),
        }
    }

    #[must_use]
    pub fn on_did_show(&self) -> &Emitter<HoverRequest> {
        &self.inner.on_did_show
    }

    #[must_use]
    pub fn on_did_hide(&self) -> &Emitter<()> {
        &self.inner.on_did_hide
    }

    /// The popup currently showing, if any.
    #[must_use]
    pub fn active(&self) -> Option<HoverRequest> {
        lock(&self.inner.state).active.clone()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        lock(&self.inner.state).pending.is_some()
    }

    /// Schedule a popup. Same target as the pending or visible popup is a
    /// no-op; a different target cancels whatever was pending and starts a
    /// fresh countdown.
    pub fn request_hover(&self, request: HoverRequest) {
        let mut state = lock(&self.inner.state);
        if state.active.as_ref().is_some_and(|a| a.target == request.target) {
            return;
        }
        if state
            .pending
            .as_ref()
            .is_some_and(|p| p.request.target == request.target)
        {
            return;
        }
        trace!(target = %request.target, "hover scheduled");
        state.pending = Some(PendingHover {
            request,
            remaining: self.inner.delay_ticks,
        });
    }

    /// Advance one frame. Promotes a pending popup whose delay elapsed.
    pub fn tick(&self) {
        let shown = {
            let mut state = lock(&self.inner.state);
            match state.pending.as_mut() {
                Some(pending) if pending.remaining > 1 => {
                    pending.remaining -= 1;
                    None
                }
                Some(_) => {
                    let pending = state.pending.take();
                    let request = pending.map(|p| p.request);
                    state.active.clone_from(&request);
                    request
                }
                None => None,
            }
        };
        if let Some(request) = shown {
            self.inner.on_did_show.fire(&request);
        }
    }

    /// Hide the popup and drop any pending one.
    pub fn cancel(&self) {
        let was_visible = {
            let mut state = lock(&self.inner.state);
            state.pending = None;
            state.active.take().is_some()
        };
        if was_visible {
            self.inner.on_did_hide.fire(&());
        }
    }

    /// Draw the active popup on top of everything else.
    pub fn render_into(&self, root: Rect, surface: &mut Surface) {
        let Some(active) = self.active() else {
            return;
        };
        let (x, y) = active.anchor;
        // One row below the anchor, clamped into the frame.
        let y = if y.saturating_add(1) < root.bottom() {
            y + 1
        } else {
            y
        };
        surface.put_str(root, x, y, &active.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(target: &str, content: &str) -> HoverRequest {
        HoverRequest {
            target: WidgetId::new(target),
            content: content.to_owned(),
            anchor: (2, 1),
        }
    }

    #[test]
    fn popup_shows_only_after_the_delay() {
        let hover = HoverService::new(3);
        hover.request_hover(request("a", "alpha"));
        hover.tick();
        hover.tick();
        assert_eq!(hover.active(), None);

        hover.tick();
        assert_eq!(hover.active().map(|r| r.content), Some("alpha".to_owned()));
    }

    #[test]
    fn different_target_restarts_the_countdown() {
        let hover = HoverService::new(2);
        hover.request_hover(request("a", "alpha"));
        hover.tick();
        // One tick to go for "a"; switching targets must start over.
        hover.request_hover(request("b", "beta"));
        hover.tick();
        assert_eq!(hover.active(), None);

        hover.tick();
        assert_eq!(hover.active().map(|r| r.content), Some("beta".to_owned()));
    }

    #[test]
    fn same_target_does_not_reset_the_countdown() {
        let hover = HoverService::new(3);
        hover.request_hover(request("a", "alpha"));
        hover.tick();
        hover.tick();
        hover.request_hover(request("a", "alpha"));
        hover.tick();
        assert!(hover.active().is_some());
    }

    #[test]
    fn cancel_hides_and_fires_once() {
        let hover = HoverService::new(1);
        let hides = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counted = std::sync::Arc::clone(&hides);
        let _sub = hover.on_did_hide().subscribe(move |_| {
            counted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        hover.request_hover(request("a", "alpha"));
        hover.tick();
        assert!(hover.active().is_some());

        hover.cancel();
        assert_eq!(hover.active(), None);
        hover.cancel();
        assert_eq!(hides.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn popup_draws_below_the_anchor() {
        let hover = HoverService::new(1);
        hover.request_hover(request("a", "tip"));
        hover.tick();

        let root = Rect::new(0, 0, 20, 5);
        let mut surface = Surface::new(20, 5);
        hover.render_into(root, &mut surface);
        assert_eq!(surface.row_text(2), "  tip");
    }
}
