#![forbid(unsafe_code)]
//! Dock panel: a tabbed, splittable widget container.
//!
//! The panel owns a [`DockNode`] tree, the current-widget pointer, and the
//! active-tab-bar marker. Everything observable happens through three
//! emitters (widget added, widget removed, current changed), so the shell
//! and the renderer never poll.
//!
//! # Invariants
//!
//! | # | Invariant |
//! |---|-----------|
//! | 1 | While the panel holds any widget, exactly one tab bar is marked active. |
//! | 2 | Re-adding an already-docked widget is a no-op. |
//! | 3 | The current-changed event fires only when the current widget actually differs. |
//! | 4 | Disposing a docked widget removes it from the tree and collapses empty areas. |
//! | 5 | In every tab area, the selected widget is visible and its siblings are hidden. |
//! | 6 | State lock is never held while firing an emitter or touching widget visibility. |

pub mod layout;

pub use layout::{
    DockLayoutData, DockMode, DockNode, Orientation, SplitArea, TabArea, TabAreaId, TabBarView,
};

use crate::sync::lock;
use crate::widget::{WidgetFlags, WidgetHandle, WidgetId};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use wharf_core::{Emitter, Rect, Subscription, Surface};

/// Where an added widget lands relative to a reference widget (or, absent
/// one, the active tab area).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DockAddMode {
    #[default]
    TabAfter,
    TabBefore,
    SplitRight,
    SplitLeft,
    SplitTop,
    SplitBottom,
}

impl DockAddMode {
    #[must_use]
    pub const fn is_split(self) -> bool {
        matches!(
            self,
            DockAddMode::SplitRight
                | DockAddMode::SplitLeft
                | DockAddMode::SplitTop
                | DockAddMode::SplitBottom
        )
    }
}

/// Placement options for [`DockPanel::add_widget`].
#[derive(Debug, Clone, Default)]
pub struct DockAddOptions {
    pub mode: DockAddMode,
    pub ref_widget: Option<WidgetId>,
}

struct DockState {
    mode: DockMode,
    root: Option<DockNode>,
    next_area: u64,
    current: Option<WidgetHandle>,
    active_area: Option<TabAreaId>,
    current_guard: Option<Subscription>,
}

struct DockInner {
    id: String,
    allow_split: bool,
    state: Mutex<DockState>,
    on_did_change_current: Emitter<Option<WidgetId>>,
    on_did_add: Emitter<WidgetHandle>,
    on_did_remove: Emitter<WidgetHandle>,
}

/// Cheap-to-clone handle to one dock panel.
#[derive(Clone)]
pub struct DockPanel {
    inner: Arc<DockInner>,
}

impl DockPanel {
    /// `id` isolates drag sources: drops are only accepted between panels
    /// sharing an id. `allow_split` off degrades split placements to tabs.
    #[must_use]
    pub fn new(id: impl Into<String>, mode: DockMode, allow_split: bool) -> Self {
        DockPanel {
            inner: Arc::new(DockInner {
                id: id.into(),
                allow_split,
                state: Mutex::new(DockState {
                    mode,
                    root: None,
                    next_area: 0,
                    current: None,
                    active_area: None,
                    current_guard: None,
                }),
                on_did_change_current: Emitter::new(),
                on_did_add: Emitter::new(),
                on_did_remove: Emitter::new(),
            }),
        }
    }

    // --- Introspection ---

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    #[must_use]
    pub fn allow_split(&self) -> bool {
        self.inner.allow_split
    }

    #[must_use]
    pub fn mode(&self) -> DockMode {
        lock(&self.inner.state).mode
    }

    pub fn set_mode(&self, mode: DockMode) {
        lock(&self.inner.state).mode = mode;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.inner.state).root.is_none()
    }

    /// All docked widgets in tree order.
    #[must_use]
    pub fn widgets(&self) -> Vec<WidgetHandle> {
        let state = lock(&self.inner.state);
        let mut out = Vec::new();
        if let Some(root) = &state.root {
            root.collect_widgets(&mut out);
        }
        out
    }

    #[must_use]
    pub fn contains(&self, id: &WidgetId) -> bool {
        let state = lock(&self.inner.state);
        state.root.as_ref().is_some_and(|r| r.area_of(id).is_some())
    }

    #[must_use]
    pub fn current_widget(&self) -> Option<WidgetHandle> {
        lock(&self.inner.state).current.clone()
    }

    #[must_use]
    pub fn active_tab_area(&self) -> Option<TabAreaId> {
        lock(&self.inner.state).active_area
    }

    /// Selected widget of every tab area; the active bar's selection comes
    /// first, the rest follow in tree order.
    #[must_use]
    pub fn selected_widgets(&self) -> Vec<WidgetHandle> {
        let state = lock(&self.inner.state);
        let Some(root) = &state.root else {
            return Vec::new();
        };
        let mut areas = Vec::new();
        root.collect_areas(&mut areas);
        let mut out = Vec::new();
        if let Some(active) = state.active_area
            && let Some(area) = areas.iter().find(|a| a.id == active)
            && let Some(w) = area.current_widget()
        {
            out.push(w.clone());
        }
        for area in &areas {
            if Some(area.id) == state.active_area {
                continue;
            }
            if let Some(w) = area.current_widget() {
                out.push(w.clone());
            }
        }
        out
    }

    /// One view per tab bar, in tree order.
    #[must_use]
    pub fn tab_bars(&self) -> Vec<TabBarView> {
        let state = lock(&self.inner.state);
        let Some(root) = &state.root else {
            return Vec::new();
        };
        let mut areas = Vec::new();
        root.collect_areas(&mut areas);
        areas
            .into_iter()
            .map(|area| TabBarView {
                area: area.id,
                titles: area
                    .widgets
                    .iter()
                    .filter_map(|w| w.id().map(|id| (id, w.title())))
                    .collect(),
                current: area.current_index,
                active: Some(area.id) == state.active_area,
            })
            .collect()
    }

    // --- Events ---

    #[must_use]
    pub fn on_did_change_current(&self) -> &Emitter<Option<WidgetId>> {
        &self.inner.on_did_change_current
    }

    #[must_use]
    pub fn on_did_add_widget(&self) -> &Emitter<WidgetHandle> {
        &self.inner.on_did_add
    }

    #[must_use]
    pub fn on_did_remove_widget(&self) -> &Emitter<WidgetHandle> {
        &self.inner.on_did_remove
    }

    // --- Mutation ---

    /// Dock a widget. Placement degrades to a plain tab insert when the
    /// panel is in single-document mode or splitting is disabled.
    pub fn add_widget(&self, widget: &WidgetHandle, options: DockAddOptions) {
        let Some(id) = widget.id() else {
            warn!(panel = %self.inner.id, "cannot dock a widget without an id");
            return;
        };
        if widget.is_disposed() {
            warn!(panel = %self.inner.id, widget = %id, "cannot dock a disposed widget");
            return;
        }

        let mut visibility = Vec::new();
        {
            let mut state = lock(&self.inner.state);
            if state.root.as_ref().is_some_and(|r| r.area_of(&id).is_some()) {
                // Single-document openers re-add on every open; idempotent.
                debug!(panel = %self.inner.id, widget = %id, "widget already docked");
                return;
            }
            self.insert_locked(&mut state, widget, &options, &mut visibility);
        }

        widget.set_flag(WidgetFlags::ATTACHED, true);
        apply_visibility(visibility);
        self.watch_dispose(widget);
        self.inner.on_did_add.fire(widget);
    }

    fn insert_locked(
        &self,
        state: &mut DockState,
        widget: &WidgetHandle,
        options: &DockAddOptions,
        visibility: &mut Vec<(WidgetHandle, bool)>,
    ) {
        let mut mode = options.mode;
        if mode.is_split() && (state.mode == DockMode::SingleDocument || !self.inner.allow_split) {
            debug!(panel = %self.inner.id, "split placement degraded to tab");
            mode = DockAddMode::TabAfter;
        }

        // First widget establishes the root.
        if state.root.is_none() {
            let area_id = alloc_area(state);
            let mut area = TabArea::new(area_id);
            area.insert(0, widget.clone());
            state.root = Some(DockNode::Tabs(area));
            state.active_area = Some(area_id);
            reconcile_area(state.root.as_ref(), area_id, visibility);
            return;
        }

        let target = self.target_area(state, options.ref_widget.as_ref());
        let Some(target) = target else {
            return;
        };

        if mode.is_split() {
            let fresh_id = alloc_area(state);
            let mut fresh = TabArea::new(fresh_id);
            fresh.insert(0, widget.clone());
            let (orientation, fresh_first) = match mode {
                DockAddMode::SplitRight => (Orientation::Horizontal, false),
                DockAddMode::SplitLeft => (Orientation::Horizontal, true),
                DockAddMode::SplitBottom => (Orientation::Vertical, false),
                DockAddMode::SplitTop => (Orientation::Vertical, true),
                DockAddMode::TabAfter | DockAddMode::TabBefore => unreachable!(),
            };
            if let Some(root) = state.root.as_mut() {
                root.split_area(target, orientation, fresh, fresh_first);
            }
            state.active_area = Some(fresh_id);
            reconcile_area(state.root.as_ref(), fresh_id, visibility);
        } else {
            let Some(root) = state.root.as_mut() else {
                return;
            };
            let Some(area) = root.area_by_id_mut(target) else {
                return;
            };
            let at = match (&options.ref_widget, mode) {
                (Some(r), DockAddMode::TabAfter) => area
                    .position_of(r)
                    .map(|i| i + 1)
                    .unwrap_or(area.widgets.len()),
                (Some(r), DockAddMode::TabBefore) => area.position_of(r).unwrap_or(0),
                _ => area.widgets.len(),
            };
            area.insert(at, widget.clone());
            if state.active_area.is_none() {
                state.active_area = Some(target);
            }
            reconcile_area(state.root.as_ref(), target, visibility);
        }
    }

    /// Tab area a placement refers to: the reference widget's area, else
    /// the active area, else the first one.
    fn target_area(&self, state: &DockState, reference: Option<&WidgetId>) -> Option<TabAreaId> {
        let root = state.root.as_ref()?;
        if let Some(r) = reference
            && let Some(area) = root.area_of(r)
        {
            return Some(area.id);
        }
        if let Some(active) = state.active_area
            && area_exists(root, active)
        {
            return Some(active);
        }
        root.first_area().map(|a| a.id)
    }

    /// Remove a widget from the tree, collapsing what empties out.
    pub fn remove_widget(&self, id: &WidgetId) -> Option<WidgetHandle> {
        let mut visibility = Vec::new();
        let (removed, was_current) = {
            let mut state = lock(&self.inner.state);
            let mut root = state.root.take()?;
            let removed = root.remove_widget(id);
            state.root = root.normalize();
            let Some(removed) = removed else {
                return None;
            };

            let active_ok = state
                .active_area
                .is_some_and(|a| state.root.as_ref().is_some_and(|r| area_exists(r, a)));
            if !active_ok {
                state.active_area =
                    state.root.as_ref().and_then(|r| r.first_area()).map(|a| a.id);
            }

            let was_current =
                state.current.as_ref().and_then(WidgetHandle::id).as_ref() == Some(id);
            if was_current {
                state.current = None;
                state.current_guard = None;
            }

            if let Some(root) = &state.root {
                let mut areas = Vec::new();
                root.collect_areas(&mut areas);
                let ids: Vec<TabAreaId> = areas.iter().map(|a| a.id).collect();
                for area_id in ids {
                    reconcile_area(state.root.as_ref(), area_id, &mut visibility);
                }
            }
            (removed, was_current)
        };

        removed.set_flag(WidgetFlags::ATTACHED, false);
        apply_visibility(visibility);
        if was_current {
            self.inner.on_did_change_current.fire(&None);
        }
        self.inner.on_did_remove.fire(&removed);
        Some(removed)
    }

    /// Make `widget` the panel's current widget: select its tab, mark its
    /// bar active, fire the change event if the current widget differs.
    pub fn set_current(&self, widget: &WidgetHandle) {
        let Some(id) = widget.id() else {
            return;
        };
        if widget.is_disposed() {
            return;
        }

        let mut visibility = Vec::new();
        let changed = {
            let mut state = lock(&self.inner.state);
            let Some(root) = state.root.as_mut() else {
                return;
            };
            let Some(area) = root.area_of_mut(&id) else {
                return;
            };
            area.current_index = area.position_of(&id);
            let area_id = area.id;
            state.active_area = Some(area_id);

            let prev = state.current.as_ref().and_then(WidgetHandle::id);
            let changed = prev.as_ref() != Some(&id);
            if changed {
                state.current = Some(widget.clone());
            }
            reconcile_area(state.root.as_ref(), area_id, &mut visibility);
            changed
        };

        apply_visibility(visibility);
        if changed {
            self.install_current_guard(widget, &id);
            self.inner.on_did_change_current.fire(&Some(id));
        }
    }

    /// Select and focus a docked widget. Returns the handle if the widget
    /// is in this panel.
    pub fn activate_widget(&self, id: &WidgetId) -> Option<WidgetHandle> {
        let widget = {
            let state = lock(&self.inner.state);
            let root = state.root.as_ref()?;
            let area = root.area_of(id)?;
            area.widgets
                .iter()
                .find(|w| w.id().as_ref() == Some(id))
                .cloned()
        }?;
        self.set_current(&widget);
        widget.activate();
        Some(widget)
    }

    /// Point the active-bar marker at the bar holding `widget`, falling
    /// back to the first bar so the marker never dangles.
    pub fn mark_active_tab_bar(&self, widget: Option<&WidgetId>) {
        let mut state = lock(&self.inner.state);
        let Some(root) = &state.root else {
            state.active_area = None;
            return;
        };
        let target = widget
            .and_then(|id| root.area_of(id).map(|a| a.id))
            .or_else(|| root.first_area().map(|a| a.id));
        state.active_area = target;
    }

    // --- Persistence ---

    /// Snapshot the live tree for deflation.
    #[must_use]
    pub fn save_layout(&self) -> DockLayoutData {
        let state = lock(&self.inner.state);
        DockLayoutData {
            mode: state.mode,
            current_uri: state.current.as_ref().and_then(|w| w.uri()),
            root: state.root.clone(),
        }
    }

    /// Replace the whole tree with a restored one. Disposed widgets are
    /// pruned, area ids are reissued from this panel's counter, and the
    /// current widget is re-resolved by URI.
    pub fn restore_layout(&self, data: DockLayoutData) {
        let mut visibility = Vec::new();
        let (attached, current) = {
            let mut state = lock(&self.inner.state);
            state.mode = data.mode;
            state.current = None;
            state.current_guard = None;

            let root = data.root.and_then(|mut r| {
                r.for_each_area_mut(&mut |area| {
                    area.widgets.retain(|w| !w.is_disposed());
                    area.current_index = match area.current_index {
                        _ if area.widgets.is_empty() => None,
                        None => Some(0),
                        Some(cur) => Some(cur.min(area.widgets.len() - 1)),
                    };
                });
                r.normalize()
            });
            let root = root.map(|mut r| {
                r.for_each_area_mut(&mut |area| {
                    area.id = TabAreaId(state.next_area);
                    state.next_area += 1;
                });
                r
            });
            state.root = root;
            state.active_area = state.root.as_ref().and_then(|r| r.first_area()).map(|a| a.id);

            let mut attached = Vec::new();
            if let Some(root) = &state.root {
                root.collect_widgets(&mut attached);
                let mut areas = Vec::new();
                root.collect_areas(&mut areas);
                let ids: Vec<TabAreaId> = areas.iter().map(|a| a.id).collect();
                for area_id in ids {
                    reconcile_area(state.root.as_ref(), area_id, &mut visibility);
                }
            }
            let current = data.current_uri.as_ref().and_then(|uri| {
                attached
                    .iter()
                    .find(|w| w.uri().as_ref() == Some(uri))
                    .cloned()
            });
            (attached, current)
        };

        for widget in &attached {
            widget.set_flag(WidgetFlags::ATTACHED, true);
            self.watch_dispose(widget);
        }
        apply_visibility(visibility);
        if let Some(current) = current {
            self.set_current(&current);
        }
    }

    // --- Rendering ---

    /// Walk the tree over `rect`, drawing each tab bar and handing each
    /// selected widget's body rect to `draw`.
    pub fn render_into(
        &self,
        rect: Rect,
        surface: &mut Surface,
        draw: &mut dyn FnMut(&WidgetHandle, Rect, &mut Surface),
    ) {
        let (root, active) = {
            let state = lock(&self.inner.state);
            (state.root.clone(), state.active_area)
        };
        if let Some(root) = root {
            render_node(&root, active, rect, surface, draw);
        }
    }

    // --- Listeners ---

    fn watch_dispose(&self, widget: &WidgetHandle) {
        let weak = Arc::downgrade(&self.inner);
        let weak_widget = widget.downgrade();
        widget
            .events()
            .on_dispose
            .subscribe(move |_| {
                if let (Some(inner), Some(widget)) = (weak.upgrade(), weak_widget.upgrade())
                    && let Some(id) = widget.id()
                {
                    DockPanel { inner }.remove_widget(&id);
                }
            })
            .detach();
    }

    fn install_current_guard(&self, widget: &WidgetHandle, id: &WidgetId) {
        let weak = Arc::downgrade(&self.inner);
        let guard_id = id.clone();
        let sub = widget.events().on_dispose.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                let cleared = {
                    let mut state = lock(&inner.state);
                    if state.current.as_ref().and_then(WidgetHandle::id).as_ref()
                        == Some(&guard_id)
                    {
                        state.current = None;
                        true
                    } else {
                        false
                    }
                };
                if cleared {
                    inner.on_did_change_current.fire(&None);
                }
            }
        });
        lock(&self.inner.state).current_guard = Some(sub);
    }
}

impl fmt::Debug for DockPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("DockPanel")
            .field("id", &self.inner.id)
            .field("mode", &state.mode)
            .field("has_root", &state.root.is_some())
            .field("active_area", &state.active_area)
            .finish()
    }
}

fn alloc_area(state: &mut DockState) -> TabAreaId {
    let id = TabAreaId(state.next_area);
    state.next_area += 1;
    id
}

fn area_exists(root: &DockNode, id: TabAreaId) -> bool {
    let mut areas = Vec::new();
    root.collect_areas(&mut areas);
    areas.iter().any(|a| a.id == id)
}

/// Queue show/hide so every widget in `area_id` matches its selection
/// state. Applied after the state lock drops.
fn reconcile_area(
    root: Option<&DockNode>,
    area_id: TabAreaId,
    out: &mut Vec<(WidgetHandle, bool)>,
) {
    let Some(root) = root else {
        return;
    };
    let mut areas = Vec::new();
    root.collect_areas(&mut areas);
    if let Some(area) = areas.into_iter().find(|a| a.id == area_id) {
        for (i, w) in area.widgets.iter().enumerate() {
            out.push((w.clone(), Some(i) == area.current_index));
        }
    }
}

fn apply_visibility(changes: Vec<(WidgetHandle, bool)>) {
    for (widget, visible) in changes {
        if visible {
            widget.show();
        } else {
            widget.hide();
        }
    }
}

fn render_node(
    node: &DockNode,
    active: Option<TabAreaId>,
    rect: Rect,
    surface: &mut Surface,
    draw: &mut dyn FnMut(&WidgetHandle, Rect, &mut Surface),
) {
    if rect.is_empty() {
        return;
    }
    match node {
        DockNode::Tabs(area) => {
            let (bar, body) = rect.take_top(1);
            let mut line = String::new();
            line.push(if Some(area.id) == active { '*' } else { ' ' });
            for (i, w) in area.widgets.iter().enumerate() {
                let title = w.title();
                if Some(i) == area.current_index {
                    line.push('[');
                    line.push_str(&title.label);
                    line.push(']');
                } else {
                    line.push(' ');
                    line.push_str(&title.label);
                    line.push(' ');
                }
            }
            surface.put_str(bar, bar.x, bar.y, &line);
            if let Some(widget) = area.current_widget() {
                draw(widget, body, surface);
            }
        }
        DockNode::Split(split) => {
            let rects = match split.orientation {
                Orientation::Horizontal => rect.split_columns(&split.sizes),
                Orientation::Vertical => rect.split_rows(&split.sizes),
            };
            for (child, child_rect) in split.children.iter().zip(rects) {
                render_node(child, active, child_rect, surface, draw);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
