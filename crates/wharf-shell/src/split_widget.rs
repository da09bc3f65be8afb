#![forbid(unsafe_code)]
//! Compound widget that stacks a fixed set of sub-widgets in a split.
//!
//! Container widgets (an inspector column, a properties sidebar) declare
//! their panes up front as URIs plus behavior constructors. On init the
//! panes are created through the [`WidgetManager`] as sub-widgets, so they
//! land in the ordinary registry with the ordinary identity rules, and get
//! portals in the [`ViewRenderer`] so the error boundary covers them too.
//!
//! Panes keep relative sizes and an independent collapsed flag. A collapsed
//! pane renders at zero extent but keeps its widget alive; toggling is by
//! pane URI. Sizes and collapsed flags round-trip through [`Stateful`].

use crate::dock::Orientation;
use crate::error::WidgetError;
use crate::manager::WidgetManager;
use crate::stateful::Stateful;
use crate::view::ViewRenderer;
use crate::widget::{WidgetBehavior, WidgetHandle};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;
use wharf_core::{Rect, Surface, Uri};

type MakeBehavior = Arc<dyn Fn() -> Box<dyn WidgetBehavior> + Send + Sync>;

/// Declaration of one pane: a stable URI, an ordering key and the behavior
/// constructor used if the widget does not exist yet.
#[derive(Clone)]
pub struct SplitPane {
    uri: Uri,
    order: i32,
    make: MakeBehavior,
}

impl SplitPane {
    pub fn new<F>(uri: Uri, order: i32, make: F) -> Self
    where
        F: Fn() -> Box<dyn WidgetBehavior> + Send + Sync + 'static,
    {
        SplitPane {
            uri,
            order,
            make: Arc::new(make),
        }
    }
}

struct Pane {
    uri: Uri,
    widget: WidgetHandle,
    collapsed: bool,
}

/// Persisted shape: effective sizes (collapsed panes store `0.0`) plus the
/// collapsed flag per pane.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct SplitState {
    #[serde(default)]
    sizes: Vec<f64>,
    #[serde(default)]
    panel_close: Vec<bool>,
}

/// A widget whose content is a fixed split of sub-widgets.
pub struct SplitWidget {
    manager: WidgetManager,
    renderer: ViewRenderer,
    orientation: Orientation,
    decls: Vec<SplitPane>,
    default_stretch: Option<Vec<f64>>,
    panes: Vec<Pane>,
    sizes: Vec<f64>,
    // State handed to `restore_state` before init produced the panes.
    restored: Option<SplitState>,
}

impl SplitWidget {
    #[must_use]
    pub fn new(
        manager: WidgetManager,
        renderer: ViewRenderer,
        orientation: Orientation,
        panes: Vec<SplitPane>,
    ) -> Self {
        SplitWidget {
            manager,
            renderer,
            orientation,
            decls: panes,
            default_stretch: None,
            panes: Vec::new(),
            sizes: Vec::new(),
            restored: None,
        }
    }

    /// Initial proportions instead of an even split. Ignored unless its
    /// length matches the pane count.
    #[must_use]
    pub fn with_default_stretch(mut self, stretch: Vec<f64>) -> Self {
        self.default_stretch = Some(stretch);
        self
    }

    #[must_use]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Sub-widgets in pane order. Empty until init ran.
    #[must_use]
    pub fn widgets(&self) -> Vec<WidgetHandle> {
        self.panes.iter().map(|p| p.widget.clone()).collect()
    }

    /// Effective relative sizes; collapsed panes report `0.0`.
    #[must_use]
    pub fn relative_sizes(&self) -> Vec<f64> {
        self.panes
            .iter()
            .zip(&self.sizes)
            .map(|(pane, size)| if pane.collapsed { 0.0 } else { *size })
            .collect()
    }

    /// Apply relative sizes. A zero entry collapses that pane, a positive
    /// one expands it, so sizes and flags cannot drift apart.
    pub fn set_relative_sizes(&mut self, sizes: &[f64]) {
        for (idx, size) in sizes.iter().enumerate().take(self.panes.len()) {
            if *size > 0.0 {
                self.sizes[idx] = *size;
                self.panes[idx].collapsed = false;
            } else {
                self.panes[idx].collapsed = true;
            }
        }
    }

    /// Whether the pane holding `uri` is currently expanded.
    #[must_use]
    pub fn is_expanded(&self, uri: &Uri) -> bool {
        self.find_pane(uri)
            .is_some_and(|idx| !self.panes[idx].collapsed)
    }

    /// Collapse or expand the pane holding `uri`. Expanding gives the pane
    /// a full share so it is visible again regardless of its old size.
    pub fn toggle_sub_widget(&mut self, uri: &Uri) {
        let Some(idx) = self.find_pane(uri) else {
            warn!(uri = %uri, "no split pane for uri");
            return;
        };
        if self.panes[idx].collapsed {
            self.panes[idx].collapsed = false;
            self.sizes[idx] = 1.0;
        } else {
            self.panes[idx].collapsed = true;
        }
    }

    pub fn collapse_panel(&mut self, idx: usize) {
        if let Some(pane) = self.panes.get_mut(idx) {
            pane.collapsed = true;
        }
    }

    pub fn expand_panel(&mut self, idx: usize) {
        if let Some(pane) = self.panes.get_mut(idx) {
            pane.collapsed = false;
        }
    }

    fn find_pane(&self, uri: &Uri) -> Option<usize> {
        let wanted = uri.without_query();
        self.panes
            .iter()
            .position(|p| p.uri.without_query() == wanted)
    }

    fn apply_state(&mut self, state: SplitState) {
        if !state.sizes.is_empty() {
            self.set_relative_sizes(&state.sizes);
        }
        for (idx, closed) in state.panel_close.iter().enumerate().take(self.panes.len()) {
            self.panes[idx].collapsed = *closed;
        }
    }
}

impl WidgetBehavior for SplitWidget {
    fn init<'a>(&'a mut self, _uri: &'a Uri) -> BoxFuture<'a, Result<(), WidgetError>> {
        async move {
            self.decls.sort_by_key(|d| d.order);
            for decl in std::mem::take(&mut self.decls) {
                let make = Arc::clone(&decl.make);
                let widget = self
                    .manager
                    .create_sub_widget(&decl.uri, move || make())
                    .await?;
                self.renderer.mount(&widget);
                self.panes.push(Pane {
                    uri: decl.uri,
                    widget,
                    collapsed: false,
                });
            }

            let count = self.panes.len();
            self.sizes = match &self.default_stretch {
                Some(stretch) if stretch.len() == count => stretch.clone(),
                _ => vec![1.0 / count.max(1) as f64; count],
            };
            if let Some(state) = self.restored.take() {
                self.apply_state(state);
            }
            Ok(())
        }
        .boxed()
    }

    fn render(&self, area: Rect, surface: &mut Surface) {
        if self.panes.is_empty() || area.is_empty() {
            return;
        }
        let sizes = self.relative_sizes();
        let rects = match self.orientation {
            Orientation::Horizontal => area.split_columns(&sizes),
            Orientation::Vertical => area.split_rows(&sizes),
        };
        for (pane, rect) in self.panes.iter().zip(rects) {
            if rect.is_empty() {
                continue;
            }
            self.renderer.render_widget(&pane.widget, rect, surface);
        }
    }

    fn stateful(&mut self) -> Option<&mut dyn Stateful> {
        Some(self)
    }
}

impl Stateful for SplitWidget {
    fn store_state(&self) -> Option<Value> {
        if self.panes.is_empty() {
            return None;
        }
        let state = SplitState {
            sizes: self.relative_sizes(),
            panel_close: self.panes.iter().map(|p| p.collapsed).collect(),
        };
        serde_json::to_value(state).ok()
    }

    fn restore_state(&mut self, state: Value) {
        let Ok(state) = serde_json::from_value::<SplitState>(state) else {
            warn!("discarding malformed split widget state");
            return;
        };
        if self.panes.is_empty() {
            self.restored = Some(state);
        } else {
            self.apply_state(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FillPane(&'static str);

    impl WidgetBehavior for FillPane {
        fn render(&self, area: Rect, surface: &mut Surface) {
            surface.put_str(area, area.x, area.y, self.0);
        }
    }

    fn fixture(orientation: Orientation) -> SplitWidget {
        let manager = WidgetManager::new();
        let renderer = ViewRenderer::new();
        let panes = vec![
            SplitPane::new(Uri::parse("pane:///beta").unwrap(), 2, || {
                Box::new(FillPane("BB"))
            }),
            SplitPane::new(Uri::parse("pane:///alpha").unwrap(), 1, || {
                Box::new(FillPane("AA"))
            }),
        ];
        SplitWidget::new(manager, renderer, orientation, panes)
    }

    #[tokio::test]
    async fn init_creates_panes_in_declared_order() {
        let mut split = fixture(Orientation::Horizontal);
        let uri = Uri::parse("panel:///inspector").unwrap();
        split.init(&uri).await.unwrap();

        let widgets = split.widgets();
        assert_eq!(widgets.len(), 2);
        // Order key wins over declaration order.
        assert_eq!(
            widgets[0].uri().map(|u| u.to_string()),
            Some("pane:///alpha".to_owned())
        );
        assert_eq!(
            widgets[1].uri().map(|u| u.to_string()),
            Some("pane:///beta".to_owned())
        );
        assert!(split.renderer.has_portal(&widgets[0].id().unwrap()));
        assert_eq!(split.relative_sizes(), vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn toggle_collapses_and_expands_by_uri() {
        let mut split = fixture(Orientation::Vertical);
        split
            .init(&Uri::parse("panel:///inspector").unwrap())
            .await
            .unwrap();

        let alpha = Uri::parse("pane:///alpha").unwrap();
        assert!(split.is_expanded(&alpha));

        split.toggle_sub_widget(&alpha);
        assert!(!split.is_expanded(&alpha));
        assert_eq!(split.relative_sizes()[0], 0.0);

        split.toggle_sub_widget(&alpha);
        assert!(split.is_expanded(&alpha));
        assert_eq!(split.relative_sizes()[0], 1.0);
    }

    #[tokio::test]
    async fn state_round_trips_collapsed_flags_and_sizes() {
        let mut split = fixture(Orientation::Horizontal);
        split
            .init(&Uri::parse("panel:///inspector").unwrap())
            .await
            .unwrap();
        split.toggle_sub_widget(&Uri::parse("pane:///beta").unwrap());
        let stored = split.store_state().unwrap();

        let mut reborn = fixture(Orientation::Horizontal);
        reborn.restore_state(stored);
        reborn
            .init(&Uri::parse("panel:///inspector").unwrap())
            .await
            .unwrap();

        assert!(reborn.is_expanded(&Uri::parse("pane:///alpha").unwrap()));
        assert!(!reborn.is_expanded(&Uri::parse("pane:///beta").unwrap()));
        assert_eq!(reborn.relative_sizes()[1], 0.0);
    }

    #[tokio::test]
    async fn render_tiles_expanded_panes() {
        let mut split = fixture(Orientation::Horizontal);
        split
            .init(&Uri::parse("panel:///inspector").unwrap())
            .await
            .unwrap();

        let mut surface = Surface::new(20, 4);
        split.render(Rect::from_size(20, 4), &mut surface);
        let row = surface.row_text(0);
        assert_eq!(&row[0..2], "AA");
        assert_eq!(&row[10..12], "BB");

        // Collapsing the left pane hands the full width to the right one.
        split.toggle_sub_widget(&Uri::parse("pane:///alpha").unwrap());
        let mut surface = Surface::new(20, 4);
        split.render(Rect::from_size(20, 4), &mut surface);
        assert_eq!(&surface.row_text(0)[0..2], "BB");
    }

    #[tokio::test]
    async fn malformed_state_is_discarded() {
        let mut split = fixture(Orientation::Horizontal);
        split
            .init(&Uri::parse("panel:///inspector").unwrap())
            .await
            .unwrap();
        split.restore_state(Value::String("nonsense".to_owned()));
        assert_eq!(split.relative_sizes(), vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn sub_widgets_share_the_manager_registry() {
        let manager = WidgetManager::new();
        let renderer = ViewRenderer::new();
        let panes = vec![SplitPane::new(
            Uri::parse("pane:///alpha").unwrap(),
            0,
            || Box::new(FillPane("AA")),
        )];
        let mut split = SplitWidget::new(
            manager.clone(),
            renderer,
            Orientation::Horizontal,
            panes,
        );
        split
            .init(&Uri::parse("panel:///inspector").unwrap())
            .await
            .unwrap();

        let id = split.widgets()[0].id().unwrap();
        assert!(manager.get_widget(&id).is_some());
    }
}
