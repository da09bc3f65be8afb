#![forbid(unsafe_code)]
//! Tab drag and drop.
//!
//! One drag session at a time: it starts from a tab, tracks the drop zone
//! under the pointer, and either drops (re-docking the widget relative to
//! the target) or cancels. Payloads carry a MIME-style marker plus the
//! source dock id; a dock only accepts drops that started in it, so tabs
//! cannot migrate between the main and bottom panels.
//!
//! Drop zones map to add modes: the center of a tab area tabs the widget
//! in, the four edge bands split. Edge zones degrade to the center when
//! the receiving dock does not allow splitting.

use crate::dock::{DockAddMode, DockAddOptions, DockPanel};
use crate::sync::lock;
use crate::widget::WidgetId;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use wharf_core::{Emitter, Rect};

/// Payload marker for widget drags.
pub const WIDGET_DRAG_MIME: &str = "application/x-wharf-widget";

/// What is being dragged and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPayload {
    pub mime: &'static str,
    /// Id of the dock panel the drag started in.
    pub source_dock: String,
    pub widget_id: WidgetId,
}

impl DragPayload {
    #[must_use]
    pub fn widget(source_dock: impl Into<String>, widget_id: WidgetId) -> Self {
        DragPayload {
            mime: WIDGET_DRAG_MIME,
            source_dock: source_dock.into(),
            widget_id,
        }
    }
}

/// Region of a tab area the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropZone {
    Center,
    Left,
    Right,
    Top,
    Bottom,
}

impl DropZone {
    /// The dock add mode a drop in this zone performs.
    #[must_use]
    pub const fn add_mode(self) -> DockAddMode {
        match self {
            DropZone::Center => DockAddMode::TabAfter,
            DropZone::Left => DockAddMode::SplitLeft,
            DropZone::Right => DockAddMode::SplitRight,
            DropZone::Top => DockAddMode::SplitTop,
            DropZone::Bottom => DockAddMode::SplitBottom,
        }
    }
}

/// Classify a pointer position within `area`. The edge bands are a
/// quarter of the extent each (at least one cell); everything else is the
/// center. Positions outside the area are `None`.
#[must_use]
pub fn zone_for_position(area: Rect, x: u16, y: u16) -> Option<DropZone> {
    if !area.contains(x, y) {
        return None;
    }
    let band_x = (area.width / 4).max(1);
    let band_y = (area.height / 4).max(1);
    if x < area.x + band_x {
        Some(DropZone::Left)
    } else if x >= area.right().saturating_sub(band_x) {
        Some(DropZone::Right)
    } else if y < area.y + band_y {
        Some(DropZone::Top)
    } else if y >= area.bottom().saturating_sub(band_y) {
        Some(DropZone::Bottom)
    } else {
        Some(DropZone::Center)
    }
}

/// A finished drop: where the dragged widget went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropEvent {
    pub widget_id: WidgetId,
    pub target: WidgetId,
    pub mode: DockAddMode,
}

struct DragSession {
    payload: DragPayload,
    over: Option<DropZone>,
}

struct DragInner {
    session: Mutex<Option<DragSession>>,
    on_did_drop: Emitter<DropEvent>,
    on_did_cancel: Emitter<()>,
}

/// Drag session state machine. Cheap to clone.
#[derive(Clone)]
pub struct DragService {
    inner: Arc<DragInner>,
}

impl Default for DragService {
    fn default() -> Self {
        Self::new()
    }
}

impl DragService {
    #[must_use]
    pub fn new() -> Self {
        DragService {
            inner: Arc::new(DragInner {
                session: Mutex::new(None),
                on_did_drop: Emitter::new(),
                on_did_cancel: Emitter::new(),
            }),
        }
    }

    #[must_use]
    pub fn on_did_drop(&self) -> &Emitter<DropEvent> {
        &self.inner.on_did_drop
    }

    #[must_use]
    pub fn on_did_cancel(&self) -> &Emitter<()> {
        &self.inner.on_did_cancel
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        lock(&self.inner.session).is_some()
    }

    /// The zone the pointer was last over, if it was acceptable.
    #[must_use]
    pub fn current_zone(&self) -> Option<DropZone> {
        lock(&self.inner.session).as_ref().and_then(|s| s.over)
    }

    /// Begin a drag. Refused while another session is running.
    pub fn start(&self, payload: DragPayload) -> bool {
        let mut session = lock(&self.inner.session);
        if session.is_some() {
            warn!("drag already in progress, ignoring start");
            return false;
        }
        debug!(widget = %payload.widget_id, "drag started");
        *session = Some(DragSession {
            payload,
            over: None,
        });
        true
    }

    /// Update the pointer position over a dock panel. Returns the zone
    /// that would accept the drop, already degraded to `Center` where the
    /// dock does not split. `None` means this dock refuses the payload or
    /// the pointer left the tab area.
    pub fn drag_over(&self, dock: &DockPanel, area: Rect, x: u16, y: u16) -> Option<DropZone> {
        let mut session = lock(&self.inner.session);
        let Some(session) = session.as_mut() else {
            return None;
        };
        if session.payload.mime != WIDGET_DRAG_MIME || session.payload.source_dock != dock.id() {
            session.over = None;
            return None;
        }
        let zone = zone_for_position(area, x, y).map(|zone| {
            if zone != DropZone::Center && !dock.allow_split() {
                DropZone::Center
            } else {
                zone
            }
        });
        session.over = zone;
        zone
    }

    /// Drop onto `target` in `dock`. The dragged widget is re-docked
    /// relative to the target using the last accepted zone. Returns the
    /// performed event, or `None` when the session or zone was invalid.
    pub fn drop(&self, dock: &DockPanel, target: &WidgetId) -> Option<DropEvent> {
        let session = lock(&self.inner.session).take();
        let Some(session) = session else {
            return None;
        };
        let Some(zone) = session.over else {
            debug!("drop without an accepted zone, cancelling");
            self.inner.on_did_cancel.fire(&());
            return None;
        };
        if session.payload.source_dock != dock.id() {
            self.inner.on_did_cancel.fire(&());
            return None;
        }
        let dragged = session.payload.widget_id;
        if dragged == *target {
            // Dropping a tab on itself moves nothing.
            self.inner.on_did_cancel.fire(&());
            return None;
        }
        let Some(widget) = dock.remove_widget(&dragged) else {
            warn!(widget = %dragged, "dragged widget vanished before drop");
            self.inner.on_did_cancel.fire(&());
            return None;
        };
        let mode = zone.add_mode();
        dock.add_widget(
            &widget,
            DockAddOptions {
                mode,
                ref_widget: Some(target.clone()),
            },
        );
        dock.set_current(&widget);
        let event = DropEvent {
            widget_id: dragged,
            target: target.clone(),
            mode,
        };
        debug!(widget = %event.widget_id, target = %event.target, "drop performed");
        self.inner.on_did_drop.fire(&event);
        Some(event)
    }

    /// Abandon the session.
    pub fn cancel(&self) {
        if lock(&self.inner.session).take().is_some() {
            self.inner.on_did_cancel.fire(&());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dock::DockMode;
    use crate::widget::{WidgetBehavior, WidgetHandle};
    use wharf_core::{Surface, Uri};

    struct Blank;
    impl WidgetBehavior for Blank {
        fn render(&self, _area: Rect, _surface: &mut Surface) {}
    }

    fn widget(name: &str) -> WidgetHandle {
        WidgetHandle::with_id(
            WidgetId::new(format!("t:///{name}")),
            Uri::parse(&format!("t:///{name}")).unwrap(),
            Box::new(Blank),
        )
    }

    #[test]
    fn zones_cover_the_area() {
        let area = Rect::new(0, 0, 40, 20);
        assert_eq!(zone_for_position(area, 3, 10), Some(DropZone::Left));
        assert_eq!(zone_for_position(area, 36, 10), Some(DropZone::Right));
        assert_eq!(zone_for_position(area, 20, 2), Some(DropZone::Top));
        assert_eq!(zone_for_position(area, 20, 17), Some(DropZone::Bottom));
        assert_eq!(zone_for_position(area, 20, 10), Some(DropZone::Center));
        assert_eq!(zone_for_position(area, 41, 10), None);
    }

    #[test]
    fn foreign_dock_refuses_the_payload() {
        let dock = DockPanel::new("main-dock", DockMode::MultipleDocument, true);
        let drag = DragService::new();
        drag.start(DragPayload::widget("bottom-dock", WidgetId::new("t:///a")));

        let zone = drag.drag_over(&dock, Rect::new(0, 0, 40, 20), 20, 10);
        assert_eq!(zone, None);
    }

    #[test]
    fn edge_zone_degrades_without_split() {
        let dock = DockPanel::new("bottom-dock", DockMode::MultipleDocument, false);
        let drag = DragService::new();
        drag.start(DragPayload::widget("bottom-dock", WidgetId::new("t:///a")));

        let zone = drag.drag_over(&dock, Rect::new(0, 0, 40, 20), 3, 10);
        assert_eq!(zone, Some(DropZone::Center));
    }

    #[test]
    fn drop_splits_the_dock() {
        let dock = DockPanel::new("main-dock", DockMode::MultipleDocument, true);
        let a = widget("a");
        let b = widget("b");
        dock.add_widget(&a, DockAddOptions::default());
        dock.add_widget(&b, DockAddOptions::default());
        assert_eq!(dock.tab_bars().len(), 1);

        let drag = DragService::new();
        drag.start(DragPayload::widget("main-dock", b.id().unwrap()));
        let zone = drag.drag_over(&dock, Rect::new(0, 0, 40, 20), 38, 10);
        assert_eq!(zone, Some(DropZone::Right));

        let event = drag.drop(&dock, &a.id().unwrap()).unwrap();
        assert_eq!(event.mode, DockAddMode::SplitRight);
        assert_eq!(dock.tab_bars().len(), 2);
        assert!(!drag.is_dragging());
        assert_eq!(dock.current_widget(), Some(b));
    }

    #[test]
    fn drop_on_center_retabs() {
        let dock = DockPanel::new("main-dock", DockMode::MultipleDocument, true);
        let a = widget("a");
        let b = widget("b");
        dock.add_widget(&a, DockAddOptions::default());
        dock.add_widget(&b, DockAddOptions::default());

        let drag = DragService::new();
        drag.start(DragPayload::widget("main-dock", b.id().unwrap()));
        drag.drag_over(&dock, Rect::new(0, 0, 40, 20), 20, 10);
        let event = drag.drop(&dock, &a.id().unwrap()).unwrap();
        assert_eq!(event.mode, DockAddMode::TabAfter);
        assert_eq!(dock.tab_bars().len(), 1);
    }

    #[test]
    fn drop_without_zone_cancels() {
        let dock = DockPanel::new("main-dock", DockMode::MultipleDocument, true);
        let a = widget("a");
        dock.add_widget(&a, DockAddOptions::default());

        let drag = DragService::new();
        drag.start(DragPayload::widget("main-dock", WidgetId::new("t:///ghost")));
        assert_eq!(drag.drop(&dock, &a.id().unwrap()), None);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn second_start_is_refused_until_cancel() {
        let drag = DragService::new();
        assert!(drag.start(DragPayload::widget("main-dock", WidgetId::new("t:///a"))));
        assert!(!drag.start(DragPayload::widget("main-dock", WidgetId::new("t:///b"))));
        drag.cancel();
        assert!(drag.start(DragPayload::widget("main-dock", WidgetId::new("t:///b"))));
    }
}
