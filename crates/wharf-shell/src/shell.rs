#![forbid(unsafe_code)]
//! Application shell: the fixed region tree and widget routing.
//!
//! The shell owns two dock panels (main, bottom), six simple regions (bars
//! and sidebars), the current-widget pointer, and the recently-closed
//! stack. It routes widgets into regions, tracks their lifecycle, and
//! produces/consumes whole-layout snapshots for the restorer.
//!
//! # Invariants
//!
//! | # | Invariant |
//! |---|-----------|
//! | 1 | A widget without an id is never attached (logged and refused). |
//! | 2 | Dock placement options for a non-dock region are an error. |
//! | 3 | Disposing the current widget advances to the next selected widget or clears current. |
//! | 4 | The bottom panel hides itself when its last widget is disposed. |
//! | 5 | Within a sidebar, at most one widget is visible. |
//! | 6 | A persisted layout with a newer version than this build is ignored wholesale. |
//! | 7 | The closed stack holds each URI at most once, most recent last. |

use crate::area::Area;
use crate::config::ShellConfig;
use crate::dock::{DockAddOptions, DockLayoutData, DockMode, DockPanel};
use crate::error::ShellError;
use crate::manager::WidgetManager;
use crate::sync::lock;
use crate::widget::{WidgetFlags, WidgetHandle, WidgetId};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use wharf_core::{Emitter, Rect, Uri};

/// Version stamped into layout snapshots. Snapshots carrying a newer
/// version than the running build are rejected wholesale.
pub const SHELL_LAYOUT_VERSION: f64 = 0.2;

/// Placement for [`ApplicationShell::add_widget`].
#[derive(Debug, Clone)]
pub struct AddWidgetOptions {
    pub area: Area,
    /// Dock placement; only meaningful for dock regions.
    pub dock: Option<DockAddOptions>,
    /// Switch the main panel's tabbing discipline while adding.
    pub dock_mode: Option<DockMode>,
}

impl AddWidgetOptions {
    #[must_use]
    pub fn new(area: Area) -> Self {
        AddWidgetOptions {
            area,
            dock: None,
            dock_mode: None,
        }
    }

    #[must_use]
    pub fn dock(mut self, options: DockAddOptions) -> Self {
        self.dock = Some(options);
        self
    }

    #[must_use]
    pub fn dock_mode(mut self, mode: DockMode) -> Self {
        self.dock_mode = Some(mode);
        self
    }
}

/// Live snapshot of the whole shell layout.
#[derive(Debug, Clone)]
pub struct LayoutData {
    pub version: f64,
    pub main_panel: DockLayoutData,
    pub bottom_panel: BottomPanelLayout,
    pub primary_sidebar: SidebarLayout,
    /// Relative widths of primary sidebar, center, secondary sidebar.
    pub left_right_sizes: Vec<f64>,
    /// Relative heights of main and bottom panel.
    pub main_bottom_sizes: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct BottomPanelLayout {
    pub layout: DockLayoutData,
    /// Whether the bottom panel was visible when the snapshot was taken.
    pub expanded: bool,
}

#[derive(Debug, Clone)]
pub struct SidebarLayout {
    pub widgets: Vec<WidgetHandle>,
}

struct SimplePanel {
    hidden: bool,
    widgets: Vec<WidgetHandle>,
}

impl SimplePanel {
    fn new(hidden: bool) -> Self {
        SimplePanel {
            hidden,
            widgets: Vec::new(),
        }
    }
}

struct ShellState {
    panels: HashMap<Area, SimplePanel>,
    bottom_hidden: bool,
    current: Option<WidgetHandle>,
    closed_stack: Vec<Uri>,
    left_right_sizes: Vec<f64>,
    main_bottom_sizes: Vec<f64>,
}

struct ShellInner {
    config: ShellConfig,
    manager: WidgetManager,
    main: DockPanel,
    bottom: DockPanel,
    state: Mutex<ShellState>,
    on_did_change_current: Emitter<Option<WidgetId>>,
    on_did_change_area_visibility: Emitter<Area>,
    on_did_reveal_tab: Emitter<WidgetId>,
}

/// Cheap-to-clone handle to the application shell.
#[derive(Clone)]
pub struct ApplicationShell {
    inner: Arc<ShellInner>,
}

impl ApplicationShell {
    #[must_use]
    pub fn new(manager: WidgetManager, config: ShellConfig) -> Self {
        let mut panels = HashMap::new();
        panels.insert(Area::TopBar, SimplePanel::new(false));
        panels.insert(Area::ActivityBar, SimplePanel::new(false));
        panels.insert(Area::PrimarySidebar, SimplePanel::new(false));
        panels.insert(Area::SecondarySidebar, SimplePanel::new(true));
        panels.insert(Area::StatusBar, SimplePanel::new(false));
        panels.insert(Area::RightBar, SimplePanel::new(true));

        let main = DockPanel::new("main-dock", config.dock_mode, config.allow_split);
        let bottom = DockPanel::new("bottom-dock", DockMode::MultipleDocument, false);

        ApplicationShell {
            inner: Arc::new(ShellInner {
                state: Mutex::new(ShellState {
                    panels,
                    bottom_hidden: true,
                    current: None,
                    closed_stack: Vec::new(),
                    left_right_sizes: config.left_right_sizes.to_vec(),
                    main_bottom_sizes: config.main_bottom_sizes.to_vec(),
                }),
                config,
                manager,
                main,
                bottom,
                on_did_change_current: Emitter::new(),
                on_did_change_area_visibility: Emitter::new(),
                on_did_reveal_tab: Emitter::new(),
            }),
        }
    }

    /// Resolve the always-present region content (activity bar, status bar)
    /// through the ordinary factory machinery. Regions without a registered
    /// factory are skipped; failures are logged, not fatal.
    pub fn init(&self) -> BoxFuture<'static, Result<(), ShellError>> {
        let shell = self.clone();
        async move {
            for area in [Area::ActivityBar, Area::StatusBar] {
                let uri = area.uri();
                if shell.inner.manager.get_factory(&uri).is_none() {
                    debug!(area = %area, "no content factory for region");
                    continue;
                }
                match shell.inner.manager.get_or_create_widget(&uri).await {
                    Ok(widget) => shell.add_widget(&widget, AddWidgetOptions::new(area))?,
                    Err(err) => {
                        warn!(area = %area, error = %err, "region content failed to load");
                    }
                }
            }
            Ok(())
        }
        .boxed()
    }

    // --- Accessors ---

    #[must_use]
    pub fn manager(&self) -> &WidgetManager {
        &self.inner.manager
    }

    #[must_use]
    pub fn main_dock(&self) -> &DockPanel {
        &self.inner.main
    }

    #[must_use]
    pub fn bottom_dock(&self) -> &DockPanel {
        &self.inner.bottom
    }

    #[must_use]
    pub fn config(&self) -> &ShellConfig {
        &self.inner.config
    }

    /// Fired with the new current widget id (or `None`).
    #[must_use]
    pub fn on_did_change_current(&self) -> &Emitter<Option<WidgetId>> {
        &self.inner.on_did_change_current
    }

    /// Fired with the region whose visibility flipped.
    #[must_use]
    pub fn on_did_change_area_visibility(&self) -> &Emitter<Area> {
        &self.inner.on_did_change_area_visibility
    }

    /// Scroll-into-view hint: fired on every activation so tab bars can
    /// bring the activated tab into view.
    #[must_use]
    pub fn on_did_reveal_tab(&self) -> &Emitter<WidgetId> {
        &self.inner.on_did_reveal_tab
    }

    #[must_use]
    pub fn current_widget(&self) -> Option<WidgetHandle> {
        lock(&self.inner.state).current.clone()
    }

    /// Current widget of a dock region. Non-dock regions are an error.
    pub fn get_current_widget(&self, area: Area) -> Result<Option<WidgetHandle>, ShellError> {
        match area {
            Area::Main => Ok(self.inner.main.current_widget()),
            Area::Bottom => Ok(self.inner.bottom.current_widget()),
            other => Err(ShellError::IllegalArea(other)),
        }
    }

    /// Region holding the widget, if it is attached anywhere.
    #[must_use]
    pub fn area_of(&self, id: &WidgetId) -> Option<Area> {
        if self.inner.main.contains(id) {
            return Some(Area::Main);
        }
        if self.inner.bottom.contains(id) {
            return Some(Area::Bottom);
        }
        let state = lock(&self.inner.state);
        for (area, panel) in &state.panels {
            if panel.widgets.iter().any(|w| w.id().as_ref() == Some(id)) {
                return Some(*area);
            }
        }
        None
    }

    /// Widgets registered to a simple region, in registration order. Dock
    /// regions answer through their panel instead.
    #[must_use]
    pub fn panel_widgets(&self, area: Area) -> Vec<WidgetHandle> {
        match area {
            Area::Main => self.inner.main.widgets(),
            Area::Bottom => self.inner.bottom.widgets(),
            other => {
                let state = lock(&self.inner.state);
                state
                    .panels
                    .get(&other)
                    .map(|p| p.widgets.clone())
                    .unwrap_or_default()
            }
        }
    }

    // --- Adding and activating ---

    /// Attach a widget to a region.
    ///
    /// Refuses (with a log, not an error) widgets lacking an id. Dock
    /// placement options for a non-dock region are [`ShellError::UnexpectedArea`].
    pub fn add_widget(
        &self,
        widget: &WidgetHandle,
        options: AddWidgetOptions,
    ) -> Result<(), ShellError> {
        let Some(id) = widget.id() else {
            warn!(area = %options.area, "refusing to add a widget without an id");
            return Ok(());
        };
        if (options.dock.is_some() || options.dock_mode.is_some()) && !options.area.is_dock() {
            return Err(ShellError::UnexpectedArea(options.area));
        }

        match options.area {
            Area::Main => {
                if let Some(mode) = options.dock_mode {
                    self.inner.main.set_mode(mode);
                }
                self.inner.main.add_widget(widget, options.dock.unwrap_or_default());
            }
            Area::Bottom => {
                self.inner.bottom.add_widget(widget, options.dock.unwrap_or_default());
            }
            area => {
                let visible = {
                    let mut state = lock(&self.inner.state);
                    let Some(panel) = state.panels.get_mut(&area) else {
                        return Err(ShellError::UnexpectedArea(area));
                    };
                    let already = panel
                        .widgets
                        .iter()
                        .any(|w| w.id().as_ref() == Some(&id));
                    if !already {
                        panel.widgets.push(widget.clone());
                    }
                    // Bars show their widgets whenever the bar itself is
                    // visible; sidebars reveal only through explicit show.
                    !panel.hidden && !area.is_sidebar()
                };
                widget.set_flag(WidgetFlags::ATTACHED, true);
                if visible {
                    widget.show();
                }
            }
        }

        widget.set_parent_area(Some(options.area));
        if !matches!(options.area, Area::StatusBar | Area::TopBar) {
            self.track(widget);
        }
        debug!(widget = %id, area = %options.area, "widget attached");
        Ok(())
    }

    /// Install the shell's lifecycle listeners on a widget. Idempotent.
    pub fn track(&self, widget: &WidgetHandle) {
        if widget.mark(WidgetFlags::TRACKED) {
            return;
        }

        let weak_inner = Arc::downgrade(&self.inner);
        let weak_widget = widget.downgrade();
        widget
            .events()
            .on_activate
            .subscribe(move |_| {
                if let (Some(inner), Some(widget)) = (weak_inner.upgrade(), weak_widget.upgrade())
                {
                    ApplicationShell { inner }.note_activated(&widget);
                }
            })
            .detach();

        let weak_inner = Arc::downgrade(&self.inner);
        let weak_widget = widget.downgrade();
        widget
            .events()
            .on_dispose
            .subscribe(move |_| {
                if let (Some(inner), Some(widget)) = (weak_inner.upgrade(), weak_widget.upgrade())
                {
                    ApplicationShell { inner }.note_disposed(&widget);
                }
            })
            .detach();
    }

    /// Select, reveal and focus a widget wherever it is attached.
    pub fn activate_widget(&self, id: &WidgetId) -> Option<WidgetHandle> {
        if let Some(widget) = self.inner.main.activate_widget(id) {
            return Some(widget);
        }
        if let Some(widget) = self.inner.bottom.activate_widget(id) {
            self.set_area_hidden(Area::Bottom, false);
            return Some(widget);
        }

        let found = {
            let state = lock(&self.inner.state);
            state.panels.iter().find_map(|(area, panel)| {
                panel
                    .widgets
                    .iter()
                    .find(|w| w.id().as_ref() == Some(id))
                    .map(|w| (*area, w.clone()))
            })
        };
        let (area, widget) = found?;
        if area.is_sidebar() {
            self.show_in_sidebar(area, &widget);
        }
        widget.activate();
        Some(widget)
    }

    fn note_activated(&self, widget: &WidgetHandle) {
        let id = widget.id();
        let changed = {
            let mut state = lock(&self.inner.state);
            let prev = state.current.as_ref().and_then(WidgetHandle::id);
            if prev == id && state.current.is_some() {
                false
            } else {
                state.current = Some(widget.clone());
                true
            }
        };
        if changed {
            self.inner.on_did_change_current.fire(&id);
        }
        if let Some(id) = id {
            self.inner.on_did_reveal_tab.fire(&id);
        }
    }

    fn note_disposed(&self, widget: &WidgetHandle) {
        if let Some(uri) = widget.uri() {
            self.push_closed(uri);
        }

        let was_current = {
            let state = lock(&self.inner.state);
            state.current.as_ref() == Some(widget)
        };
        if was_current {
            let next = match widget.parent_area() {
                Some(Area::Main) => self.inner.main.selected_widgets(),
                Some(Area::Bottom) => self.inner.bottom.selected_widgets(),
                _ => Vec::new(),
            }
            .into_iter()
            .find(|w| !w.is_disposed() && w != widget);
            match next.as_ref().and_then(WidgetHandle::id) {
                Some(next_id) => {
                    // Routes through the dock so its selection follows;
                    // note_activated fires the change event.
                    self.activate_widget(&next_id);
                }
                None => {
                    lock(&self.inner.state).current = None;
                    self.inner.on_did_change_current.fire(&None);
                }
            }
        }

        if widget.parent_area() == Some(Area::Bottom) && self.inner.bottom.is_empty() {
            self.set_area_hidden(Area::Bottom, true);
        }
    }

    // --- Recently closed ---

    fn push_closed(&self, uri: Uri) {
        let mut state = lock(&self.inner.state);
        state.closed_stack.retain(|u| u != &uri);
        state.closed_stack.push(uri);
    }

    /// Pop the most recently closed URI.
    #[must_use]
    pub fn pop_last_closed(&self) -> Option<Uri> {
        lock(&self.inner.state).closed_stack.pop()
    }

    /// The closed stack, oldest first.
    #[must_use]
    pub fn closed_uris(&self) -> Vec<Uri> {
        lock(&self.inner.state).closed_stack.clone()
    }

    // --- Region visibility ---

    #[must_use]
    pub fn is_area_hidden(&self, area: Area) -> bool {
        match area {
            Area::Main => false,
            Area::Bottom => lock(&self.inner.state).bottom_hidden,
            other => {
                let state = lock(&self.inner.state);
                state.panels.get(&other).map(|p| p.hidden).unwrap_or(true)
            }
        }
    }

    /// Hide or reveal a region. The main panel is always visible.
    pub fn set_area_hidden(&self, area: Area, hidden: bool) {
        if area == Area::Main {
            warn!("the main panel cannot be hidden");
            return;
        }
        if area == Area::Bottom {
            let changed = {
                let mut state = lock(&self.inner.state);
                if state.bottom_hidden == hidden {
                    false
                } else {
                    state.bottom_hidden = hidden;
                    true
                }
            };
            if changed {
                self.inner.on_did_change_area_visibility.fire(&Area::Bottom);
            }
            return;
        }

        let (changed, widgets) = {
            let mut state = lock(&self.inner.state);
            let Some(panel) = state.panels.get_mut(&area) else {
                return;
            };
            if panel.hidden == hidden {
                (false, Vec::new())
            } else {
                panel.hidden = hidden;
                (true, panel.widgets.clone())
            }
        };
        if !changed {
            return;
        }
        for widget in &widgets {
            if hidden {
                widget.hide();
            } else if !area.is_sidebar() {
                // Sidebars re-reveal through show_in_sidebar only.
                widget.show();
            }
        }
        self.inner.on_did_change_area_visibility.fire(&area);
    }

    /// Reveal the bottom panel if it is hidden or squeezed to nothing.
    pub fn expand_bottom_if_collapsed(&self) {
        if self.is_area_hidden(Area::Bottom) {
            self.set_area_hidden(Area::Bottom, false);
        }
        let mut state = lock(&self.inner.state);
        if state.main_bottom_sizes.get(1).copied().unwrap_or(0.0) < 0.05 {
            state.main_bottom_sizes = self.inner.config.main_bottom_sizes.to_vec();
        }
    }

    // --- Sidebars ---

    /// Show exactly this widget in the sidebar, hiding its siblings and
    /// revealing the sidebar itself.
    pub fn show_in_sidebar(&self, area: Area, widget: &WidgetHandle) {
        if !area.is_sidebar() {
            warn!(area = %area, "show_in_sidebar called for a non-sidebar region");
            return;
        }
        let Some(id) = widget.id() else {
            warn!("refusing to show a widget without an id in a sidebar");
            return;
        };

        let (siblings, was_hidden) = {
            let mut state = lock(&self.inner.state);
            let Some(panel) = state.panels.get_mut(&area) else {
                return;
            };
            if !panel.widgets.iter().any(|w| w.id().as_ref() == Some(&id)) {
                panel.widgets.push(widget.clone());
            }
            let was_hidden = panel.hidden;
            panel.hidden = false;
            let siblings: Vec<WidgetHandle> = panel
                .widgets
                .iter()
                .filter(|w| w.id().as_ref() != Some(&id))
                .cloned()
                .collect();
            (siblings, was_hidden)
        };

        widget.set_flag(WidgetFlags::ATTACHED, true);
        widget.set_parent_area(Some(area));
        self.track(widget);
        for sibling in siblings {
            sibling.hide();
        }
        widget.show();
        if was_hidden {
            self.inner.on_did_change_area_visibility.fire(&area);
        }
    }

    /// Toggle semantics for sidebar content: hide the sidebar when this
    /// widget is the one showing, otherwise show it exclusively.
    pub fn toggle_in_sidebar(&self, area: Area, widget: &WidgetHandle) {
        if !area.is_sidebar() {
            warn!(area = %area, "toggle_in_sidebar called for a non-sidebar region");
            return;
        }
        let showing = !self.is_area_hidden(area) && widget.is_visible();
        if showing {
            widget.hide();
            self.set_area_hidden(area, true);
        } else {
            self.show_in_sidebar(area, widget);
        }
    }

    /// The sidebar widget currently shown, if the sidebar is open.
    #[must_use]
    pub fn sidebar_visible_widget(&self, area: Area) -> Option<WidgetHandle> {
        let state = lock(&self.inner.state);
        let panel = state.panels.get(&area)?;
        if panel.hidden {
            return None;
        }
        panel.widgets.iter().find(|w| w.is_visible()).cloned()
    }

    // --- Geometry ---

    /// Rectangle of every region for a frame of `root` size. Hidden
    /// regions get empty rects.
    #[must_use]
    pub fn region_rects(&self, root: Rect) -> HashMap<Area, Rect> {
        let cfg = &self.inner.config;
        let state = lock(&self.inner.state);
        let hidden = |area: Area| state.panels.get(&area).map(|p| p.hidden).unwrap_or(true);

        let mut rects = HashMap::new();
        let (top, rest) = root.take_top(if hidden(Area::TopBar) {
            0
        } else {
            cfg.top_bar_height
        });
        let (rest, status) = rest.take_bottom(if hidden(Area::StatusBar) {
            0
        } else {
            cfg.status_bar_height
        });
        let (activity, rest) = rest.take_left(if hidden(Area::ActivityBar) {
            0
        } else {
            cfg.activity_bar_width
        });
        let (rest, right) = rest.take_right(if hidden(Area::RightBar) {
            0
        } else {
            cfg.right_bar_width
        });

        let mut lr = state.left_right_sizes.clone();
        lr.resize(3, 0.0);
        if hidden(Area::PrimarySidebar) {
            lr[0] = 0.0;
        }
        if hidden(Area::SecondarySidebar) {
            lr[2] = 0.0;
        }
        let columns = rest.split_columns(&lr);

        let mut mb = state.main_bottom_sizes.clone();
        mb.resize(2, 0.0);
        if state.bottom_hidden {
            mb[1] = 0.0;
        }
        let rows = columns[1].split_rows(&mb);

        rects.insert(Area::TopBar, top);
        rects.insert(Area::StatusBar, status);
        rects.insert(Area::ActivityBar, activity);
        rects.insert(Area::RightBar, right);
        rects.insert(Area::PrimarySidebar, columns[0]);
        rects.insert(Area::SecondarySidebar, columns[2]);
        rects.insert(Area::Main, rows[0]);
        rects.insert(Area::Bottom, rows[1]);
        rects
    }

    /// Relative widths of primary sidebar, center, secondary sidebar.
    #[must_use]
    pub fn left_right_sizes(&self) -> Vec<f64> {
        lock(&self.inner.state).left_right_sizes.clone()
    }

    pub fn set_left_right_sizes(&self, sizes: Vec<f64>) {
        if sizes.len() == 3 {
            lock(&self.inner.state).left_right_sizes = sizes;
        }
    }

    /// Relative heights of main and bottom panel.
    #[must_use]
    pub fn main_bottom_sizes(&self) -> Vec<f64> {
        lock(&self.inner.state).main_bottom_sizes.clone()
    }

    pub fn set_main_bottom_sizes(&self, sizes: Vec<f64>) {
        if sizes.len() == 2 {
            lock(&self.inner.state).main_bottom_sizes = sizes;
        }
    }

    // --- Layout snapshots ---

    /// Snapshot the whole shell for persistence.
    #[must_use]
    pub fn get_layout_data(&self) -> LayoutData {
        let main = self.inner.main.save_layout();
        let bottom = self.inner.bottom.save_layout();
        let state = lock(&self.inner.state);
        LayoutData {
            version: SHELL_LAYOUT_VERSION,
            main_panel: main,
            bottom_panel: BottomPanelLayout {
                layout: bottom,
                expanded: !state.bottom_hidden,
            },
            primary_sidebar: SidebarLayout {
                widgets: state
                    .panels
                    .get(&Area::PrimarySidebar)
                    .map(|p| p.widgets.clone())
                    .unwrap_or_default(),
            },
            left_right_sizes: state.left_right_sizes.clone(),
            main_bottom_sizes: state.main_bottom_sizes.clone(),
        }
    }

    /// Apply a layout snapshot. Returns `false` (leaving the shell
    /// untouched) when the snapshot's version is newer than this build.
    pub fn set_layout_data(&self, data: LayoutData) -> bool {
        if data.version > SHELL_LAYOUT_VERSION {
            warn!(
                stored = data.version,
                current = SHELL_LAYOUT_VERSION,
                "persisted layout version is newer than this build; ignoring"
            );
            return false;
        }

        self.inner.main.restore_layout(data.main_panel);
        self.inner.bottom.restore_layout(data.bottom_panel.layout);
        let bottom_empty = self.inner.bottom.is_empty();

        {
            let mut state = lock(&self.inner.state);
            state.bottom_hidden = bottom_empty || !data.bottom_panel.expanded;
            if data.left_right_sizes.len() == 3 {
                state.left_right_sizes = data.left_right_sizes;
            }
            if data.main_bottom_sizes.len() == 2 {
                state.main_bottom_sizes = data.main_bottom_sizes;
            }
            if let Some(panel) = state.panels.get_mut(&Area::PrimarySidebar) {
                for widget in data.primary_sidebar.widgets {
                    if widget.is_disposed() {
                        continue;
                    }
                    let id = widget.id();
                    if !panel.widgets.iter().any(|w| w.id() == id) {
                        panel.widgets.push(widget);
                    }
                }
            }
        }

        for widget in self.inner.main.widgets() {
            widget.set_parent_area(Some(Area::Main));
            self.track(&widget);
        }
        for widget in self.inner.bottom.widgets() {
            widget.set_parent_area(Some(Area::Bottom));
            self.track(&widget);
        }
        for widget in self.panel_widgets(Area::PrimarySidebar) {
            widget.set_parent_area(Some(Area::PrimarySidebar));
            self.track(&widget);
        }

        if let Some(current) = self.inner.main.current_widget() {
            self.note_activated(&current);
        }
        info!("layout snapshot applied");
        true
    }
}

impl fmt::Debug for ApplicationShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationShell")
            .field("main", &self.inner.main)
            .field("bottom", &self.inner.bottom)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::WidgetBehavior;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wharf_core::Surface;

    struct Blank;
    impl WidgetBehavior for Blank {
        fn render(&self, _area: Rect, _surface: &mut Surface) {}
    }

    fn widget(name: &str) -> WidgetHandle {
        let w = WidgetHandle::with_id(
            WidgetId::new(format!("t:///{name}")),
            Uri::parse(&format!("t:///{name}")).unwrap(),
            Box::new(Blank),
        );
        w.update_title(|t| t.label = name.to_owned());
        w
    }

    fn shell() -> ApplicationShell {
        ApplicationShell::new(WidgetManager::new(), ShellConfig::default())
    }

    #[test]
    fn dock_options_for_bar_area_is_an_error() {
        let shell = shell();
        let w = widget("a");
        let err = shell
            .add_widget(
                &w,
                AddWidgetOptions::new(Area::StatusBar).dock(DockAddOptions::default()),
            )
            .unwrap_err();
        assert!(matches!(err, ShellError::UnexpectedArea(Area::StatusBar)));
    }

    #[test]
    fn widget_without_id_is_refused_quietly() {
        let shell = shell();
        let w = WidgetHandle::new(Box::new(Blank));
        shell
            .add_widget(&w, AddWidgetOptions::new(Area::Main))
            .unwrap();
        assert!(shell.main_dock().is_empty());
        assert!(!w.is_attached());
    }

    #[test]
    fn adding_to_main_routes_to_the_dock() {
        let shell = shell();
        let w = widget("a");
        shell
            .add_widget(&w, AddWidgetOptions::new(Area::Main))
            .unwrap();
        assert!(shell.main_dock().contains(&w.id().unwrap()));
        assert_eq!(shell.area_of(&w.id().unwrap()), Some(Area::Main));
        assert_eq!(w.parent_area(), Some(Area::Main));
    }

    #[test]
    fn activation_updates_current_and_fires_once() {
        let shell = shell();
        let a = widget("a");
        let b = widget("b");
        shell.add_widget(&a, AddWidgetOptions::new(Area::Main)).unwrap();
        shell.add_widget(&b, AddWidgetOptions::new(Area::Main)).unwrap();

        let changes = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&changes);
        let _sub = shell.on_did_change_current().subscribe(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        shell.activate_widget(&a.id().unwrap());
        shell.activate_widget(&a.id().unwrap());
        assert_eq!(shell.current_widget(), Some(a.clone()));
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disposing_current_advances_to_next_selected() {
        let shell = shell();
        let a = widget("a");
        let b = widget("b");
        shell.add_widget(&a, AddWidgetOptions::new(Area::Main)).unwrap();
        shell.add_widget(&b, AddWidgetOptions::new(Area::Main)).unwrap();
        shell.activate_widget(&b.id().unwrap());
        assert_eq!(shell.current_widget(), Some(b.clone()));

        b.dispose();
        assert_eq!(shell.current_widget(), Some(a.clone()));
    }

    #[test]
    fn disposing_last_widget_clears_current() {
        let shell = shell();
        let a = widget("a");
        shell.add_widget(&a, AddWidgetOptions::new(Area::Main)).unwrap();
        shell.activate_widget(&a.id().unwrap());

        a.dispose();
        assert_eq!(shell.current_widget(), None);
    }

    #[test]
    fn closed_stack_dedups_and_orders() {
        let shell = shell();
        for name in ["a", "b", "a", "c"] {
            let w = widget(name);
            shell.add_widget(&w, AddWidgetOptions::new(Area::Main)).unwrap();
            w.dispose();
        }
        let uris: Vec<String> = shell.closed_uris().iter().map(|u| u.to_string()).collect();
        assert_eq!(uris, vec!["t:///b", "t:///a", "t:///c"]);

        assert_eq!(shell.pop_last_closed().unwrap().to_string(), "t:///c");
    }

    #[test]
    fn bottom_hides_when_emptied() {
        let shell = shell();
        let w = widget("logs");
        shell.add_widget(&w, AddWidgetOptions::new(Area::Bottom)).unwrap();
        shell.set_area_hidden(Area::Bottom, false);
        assert!(!shell.is_area_hidden(Area::Bottom));

        w.dispose();
        assert!(shell.is_area_hidden(Area::Bottom));
    }

    #[test]
    fn sidebar_visibility_is_exclusive() {
        let shell = shell();
        let files = widget("files");
        let search = widget("search");
        shell.show_in_sidebar(Area::PrimarySidebar, &files);
        assert!(files.is_visible());

        shell.show_in_sidebar(Area::PrimarySidebar, &search);
        assert!(!files.is_visible());
        assert!(search.is_visible());
        assert_eq!(
            shell.sidebar_visible_widget(Area::PrimarySidebar),
            Some(search.clone())
        );
    }

    #[test]
    fn sidebar_toggle_hides_and_restores() {
        let shell = shell();
        let files = widget("files");
        shell.toggle_in_sidebar(Area::PrimarySidebar, &files);
        assert!(files.is_visible());
        assert!(!shell.is_area_hidden(Area::PrimarySidebar));

        shell.toggle_in_sidebar(Area::PrimarySidebar, &files);
        assert!(!files.is_visible());
        assert!(shell.is_area_hidden(Area::PrimarySidebar));
    }

    #[test]
    fn region_rects_tile_the_frame() {
        let shell = shell();
        let rects = shell.region_rects(Rect::new(0, 0, 80, 24));

        // Bars take their strips.
        assert_eq!(rects[&Area::TopBar].height, 1);
        assert_eq!(rects[&Area::StatusBar].height, 1);
        assert_eq!(rects[&Area::ActivityBar].width, 3);
        // Hidden regions are empty.
        assert!(rects[&Area::SecondarySidebar].is_empty());
        assert!(rects[&Area::Bottom].is_empty());
        assert!(rects[&Area::RightBar].is_empty());
        // Main fills the remaining center.
        let main = rects[&Area::Main];
        assert!(!main.is_empty());
        assert_eq!(main.bottom(), 23);
        let primary = rects[&Area::PrimarySidebar];
        assert_eq!(primary.right(), main.x);
    }

    #[test]
    fn newer_layout_version_is_rejected() {
        let shell = shell();
        let a = widget("a");
        shell.add_widget(&a, AddWidgetOptions::new(Area::Main)).unwrap();

        let mut data = shell.get_layout_data();
        data.version = SHELL_LAYOUT_VERSION + 0.1;
        let fresh = ApplicationShell::new(WidgetManager::new(), ShellConfig::default());
        assert!(!fresh.set_layout_data(data));
        assert!(fresh.main_dock().is_empty());
    }

    #[test]
    fn layout_snapshot_round_trips_bottom_visibility() {
        let shell = shell();
        let logs = widget("logs");
        shell.add_widget(&logs, AddWidgetOptions::new(Area::Bottom)).unwrap();
        shell.set_area_hidden(Area::Bottom, false);

        let data = shell.get_layout_data();
        assert!(data.bottom_panel.expanded);

        let fresh = ApplicationShell::new(WidgetManager::new(), ShellConfig::default());
        assert!(fresh.set_layout_data(data));
        assert!(!fresh.is_area_hidden(Area::Bottom));
    }
}
