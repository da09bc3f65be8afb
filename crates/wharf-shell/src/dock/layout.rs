#![forbid(unsafe_code)]
//! Dock layout tree.
//!
//! A dock panel's content is a tree: split nodes with relative sizes over
//! tab areas holding widgets. The tree owns widget handles; pruning a
//! subtree drops the handles, not the widgets.
//!
//! `normalize` is the single place tree shape is repaired: empty tab areas
//! disappear and single-child splits collapse into their child, so the rest
//! of the code can assume every split has at least two children.

use crate::widget::{Title, WidgetHandle, WidgetId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tabbing discipline of a dock panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DockMode {
    /// Free-form: widgets may be grouped and split arbitrarily.
    MultipleDocument,
    /// One tab area; adds always land there and splits degrade to tabs.
    SingleDocument,
}

/// Split direction. `Horizontal` lays children out side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Identifier of one tab area within a dock panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabAreaId(pub(crate) u64);

impl fmt::Display for TabAreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "area-{}", self.0)
    }
}

/// A group of tabbed widgets. At most one is selected.
#[derive(Debug, Clone)]
pub struct TabArea {
    pub id: TabAreaId,
    pub widgets: Vec<WidgetHandle>,
    pub current_index: Option<usize>,
}

impl TabArea {
    #[must_use]
    pub fn new(id: TabAreaId) -> Self {
        TabArea {
            id,
            widgets: Vec::new(),
            current_index: None,
        }
    }

    #[must_use]
    pub fn current_widget(&self) -> Option<&WidgetHandle> {
        self.current_index.and_then(|i| self.widgets.get(i))
    }

    #[must_use]
    pub fn position_of(&self, id: &WidgetId) -> Option<usize> {
        self.widgets
            .iter()
            .position(|w| w.id().as_ref() == Some(id))
    }

    /// Insert at `index` (clamped), selecting the tab if nothing was
    /// selected yet.
    pub fn insert(&mut self, index: usize, widget: WidgetHandle) {
        let index = index.min(self.widgets.len());
        self.widgets.insert(index, widget);
        match self.current_index {
            None => self.current_index = Some(index),
            Some(cur) if index <= cur => self.current_index = Some(cur + 1),
            Some(_) => {}
        }
    }

    /// Remove the widget with `id`, keeping the selection on an adjacent
    /// tab when the selected one goes away.
    pub fn remove(&mut self, id: &WidgetId) -> Option<WidgetHandle> {
        let index = self.position_of(id)?;
        let removed = self.widgets.remove(index);
        self.current_index = if self.widgets.is_empty() {
            None
        } else {
            match self.current_index {
                Some(cur) if index < cur => Some(cur - 1),
                Some(cur) if index == cur => Some(index.min(self.widgets.len() - 1)),
                keep => keep,
            }
        };
        Some(removed)
    }
}

/// A split over child nodes with relative sizes.
#[derive(Debug, Clone)]
pub struct SplitArea {
    pub orientation: Orientation,
    pub children: Vec<DockNode>,
    /// Relative weights, same length as `children`. Not required to sum to
    /// one; consumers normalize.
    pub sizes: Vec<f64>,
}

/// One node of the layout tree.
#[derive(Debug, Clone)]
pub enum DockNode {
    Tabs(TabArea),
    Split(SplitArea),
}

impl DockNode {
    /// All widgets in depth-first tree order.
    pub fn collect_widgets(&self, out: &mut Vec<WidgetHandle>) {
        match self {
            DockNode::Tabs(tabs) => out.extend(tabs.widgets.iter().cloned()),
            DockNode::Split(split) => {
                for child in &split.children {
                    child.collect_widgets(out);
                }
            }
        }
    }

    /// All tab areas in depth-first tree order.
    pub fn collect_areas<'a>(&'a self, out: &mut Vec<&'a TabArea>) {
        match self {
            DockNode::Tabs(tabs) => out.push(tabs),
            DockNode::Split(split) => {
                for child in &split.children {
                    child.collect_areas(out);
                }
            }
        }
    }

    /// Mutable visit over every tab area, in tree order.
    pub fn for_each_area_mut(&mut self, f: &mut impl FnMut(&mut TabArea)) {
        match self {
            DockNode::Tabs(tabs) => f(tabs),
            DockNode::Split(split) => {
                for child in &mut split.children {
                    child.for_each_area_mut(f);
                }
            }
        }
    }

    /// Tab area containing the widget with `id`.
    #[must_use]
    pub fn area_of(&self, id: &WidgetId) -> Option<&TabArea> {
        match self {
            DockNode::Tabs(tabs) => tabs.position_of(id).map(|_| tabs),
            DockNode::Split(split) => split.children.iter().find_map(|c| c.area_of(id)),
        }
    }

    #[must_use]
    pub fn area_of_mut(&mut self, id: &WidgetId) -> Option<&mut TabArea> {
        match self {
            DockNode::Tabs(tabs) => {
                if tabs.position_of(id).is_some() {
                    Some(tabs)
                } else {
                    None
                }
            }
            DockNode::Split(split) => {
                split.children.iter_mut().find_map(|c| c.area_of_mut(id))
            }
        }
    }

    #[must_use]
    pub fn area_by_id_mut(&mut self, id: TabAreaId) -> Option<&mut TabArea> {
        match self {
            DockNode::Tabs(tabs) => {
                if tabs.id == id {
                    Some(tabs)
                } else {
                    None
                }
            }
            DockNode::Split(split) => {
                split.children.iter_mut().find_map(|c| c.area_by_id_mut(id))
            }
        }
    }

    #[must_use]
    pub fn first_area(&self) -> Option<&TabArea> {
        match self {
            DockNode::Tabs(tabs) => Some(tabs),
            DockNode::Split(split) => split.children.iter().find_map(DockNode::first_area),
        }
    }

    /// Remove the widget with `id` wherever it is. The caller normalizes
    /// afterwards.
    pub fn remove_widget(&mut self, id: &WidgetId) -> Option<WidgetHandle> {
        match self {
            DockNode::Tabs(tabs) => tabs.remove(id),
            DockNode::Split(split) => {
                split.children.iter_mut().find_map(|c| c.remove_widget(id))
            }
        }
    }

    /// Replace the tab area `target` with a split of itself and `fresh`.
    /// Returns false if `target` is not in this subtree.
    pub fn split_area(
        &mut self,
        target: TabAreaId,
        orientation: Orientation,
        fresh: TabArea,
        fresh_first: bool,
    ) -> bool {
        self.split_area_inner(target, orientation, &mut Some(fresh), fresh_first)
    }

    fn split_area_inner(
        &mut self,
        target: TabAreaId,
        orientation: Orientation,
        fresh: &mut Option<TabArea>,
        fresh_first: bool,
    ) -> bool {
        match self {
            DockNode::Tabs(tabs) => {
                if tabs.id != target {
                    return false;
                }
                let Some(fresh_area) = fresh.take() else {
                    return false;
                };
                let existing = DockNode::Tabs(std::mem::replace(tabs, TabArea::new(target)));
                let fresh_node = DockNode::Tabs(fresh_area);
                let children = if fresh_first {
                    vec![fresh_node, existing]
                } else {
                    vec![existing, fresh_node]
                };
                *self = DockNode::Split(SplitArea {
                    orientation,
                    children,
                    sizes: vec![0.5, 0.5],
                });
                true
            }
            DockNode::Split(split) => split
                .children
                .iter_mut()
                .any(|c| c.split_area_inner(target, orientation, fresh, fresh_first)),
        }
    }

    /// Prune empty tab areas and collapse trivial splits. Consumes the
    /// node; returns `None` when the whole subtree is empty.
    #[must_use]
    pub fn normalize(self) -> Option<DockNode> {
        match self {
            DockNode::Tabs(tabs) => {
                if tabs.widgets.is_empty() {
                    None
                } else {
                    Some(DockNode::Tabs(tabs))
                }
            }
            DockNode::Split(split) => {
                let orientation = split.orientation;
                let mut children = Vec::new();
                let mut sizes = Vec::new();
                let fallback = if split.children.is_empty() {
                    0.0
                } else {
                    1.0 / split.children.len() as f64
                };
                for (i, child) in split.children.into_iter().enumerate() {
                    let size = split.sizes.get(i).copied().unwrap_or(fallback);
                    if let Some(kept) = child.normalize() {
                        children.push(kept);
                        sizes.push(size);
                    }
                }
                match children.len() {
                    0 => None,
                    1 => children.pop(),
                    _ => Some(DockNode::Split(SplitArea {
                        orientation,
                        children,
                        sizes,
                    })),
                }
            }
        }
    }
}

/// Snapshot of a dock panel's live layout.
#[derive(Debug, Clone)]
pub struct DockLayoutData {
    pub mode: DockMode,
    /// URI of the panel's current widget, if any.
    pub current_uri: Option<wharf_core::Uri>,
    pub root: Option<DockNode>,
}

/// Read-only view of one tab bar, for rendering and assertions.
#[derive(Debug, Clone)]
pub struct TabBarView {
    pub area: TabAreaId,
    pub titles: Vec<(WidgetId, Title)>,
    pub current: Option<usize>,
    /// Whether this bar is the panel's active tab bar.
    pub active: bool,
}
