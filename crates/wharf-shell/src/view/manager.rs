#![forbid(unsafe_code)]
//! Startup orchestration and per-frame composition.
//!
//! Initialization runs in a fixed order: shell region content first, then
//! the persisted layout, then portals for everything that materialized,
//! then the ready event. Per frame, the manager computes region
//! rectangles, lets each dock panel draw its tab bars, routes every widget
//! body through the render error boundary, and finally lays the hover
//! popup on top.

use crate::area::Area;
use crate::error::ShellError;
use crate::restorer::{LayoutRestorer, RestoreSummary};
use crate::services::HoverService;
use crate::shell::ApplicationShell;
use crate::view::ViewRenderer;
use crate::widget::WidgetHandle;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use wharf_core::{Emitter, Rect, Surface};

struct ViewManagerInner {
    shell: ApplicationShell,
    renderer: ViewRenderer,
    restorer: LayoutRestorer,
    hover: HoverService,
    initialized: AtomicBool,
    on_did_init: Emitter<()>,
}

/// Owns the frame loop's orchestration. Cheap to clone.
#[derive(Clone)]
pub struct ViewManager {
    inner: Arc<ViewManagerInner>,
}

impl ViewManager {
    #[must_use]
    pub fn new(
        shell: ApplicationShell,
        renderer: ViewRenderer,
        restorer: LayoutRestorer,
        hover: HoverService,
    ) -> Self {
        ViewManager {
            inner: Arc::new(ViewManagerInner {
                shell,
                renderer,
                restorer,
                hover,
                initialized: AtomicBool::new(false),
                on_did_init: Emitter::new(),
            }),
        }
    }

    #[must_use]
    pub fn shell(&self) -> &ApplicationShell {
        &self.inner.shell
    }

    #[must_use]
    pub fn renderer(&self) -> &ViewRenderer {
        &self.inner.renderer
    }

    #[must_use]
    pub fn hover(&self) -> &HoverService {
        &self.inner.hover
    }

    /// Fired once, after regions and layout are ready.
    #[must_use]
    pub fn on_did_init(&self) -> &Emitter<()> {
        &self.inner.on_did_init
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Bring the shell up: region content, persisted layout, portals,
    /// ready event. A failed restore falls back to the default layout.
    /// Calling this twice is a logged no-op.
    pub fn init(&self) -> BoxFuture<'static, Result<RestoreSummary, ShellError>> {
        let this = self.clone();
        async move {
            if this.inner.initialized.swap(true, Ordering::SeqCst) {
                warn!("view manager already initialized");
                return Ok(RestoreSummary::default());
            }
            this.inner.shell.init().await?;
            let summary = match this.inner.restorer.restore_layout().await {
                Ok(summary) => summary,
                Err(err) => {
                    warn!(error = %err, "layout restore failed, starting with default layout");
                    RestoreSummary::default()
                }
            };
            for widget in this.inner.shell.manager().widgets() {
                this.inner.renderer.mount(&widget);
            }
            info!(
                restored = summary.restored_widgets,
                "view manager initialized"
            );
            this.inner.on_did_init.fire(&());
            Ok(summary)
        }
        .boxed()
    }

    /// Advance frame-based timers.
    pub fn tick(&self) {
        self.inner.hover.tick();
    }

    /// Compose one frame onto the surface.
    pub fn render_frame(&self, surface: &mut Surface) {
        surface.clear();
        let root = surface.bounds();
        let rects = self.inner.shell.region_rects(root);
        let renderer = self.inner.renderer.clone();
        let mut draw = move |widget: &WidgetHandle, body: Rect, surface: &mut Surface| {
            renderer.render_widget(widget, body, surface);
        };

        let main = rects[&Area::Main];
        if !main.is_empty() {
            self.inner.shell.main_dock().render_into(main, surface, &mut draw);
        }
        let bottom = rects[&Area::Bottom];
        if !bottom.is_empty() {
            self.inner
                .shell
                .bottom_dock()
                .render_into(bottom, surface, &mut draw);
        }

        for area in [Area::PrimarySidebar, Area::SecondarySidebar] {
            let rect = rects[&area];
            if rect.is_empty() {
                continue;
            }
            if let Some(widget) = self.inner.shell.sidebar_visible_widget(area) {
                self.inner.renderer.render_widget(&widget, rect, surface);
            }
        }

        for area in [Area::TopBar, Area::ActivityBar, Area::StatusBar, Area::RightBar] {
            let rect = rects[&area];
            if rect.is_empty() {
                continue;
            }
            let widget = self
                .inner
                .shell
                .panel_widgets(area)
                .into_iter()
                .find(WidgetHandle::is_visible);
            if let Some(widget) = widget {
                self.inner.renderer.render_widget(&widget, rect, surface);
            }
        }

        self.inner.hover.render_into(root, surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShellConfig;
    use crate::factory::WidgetFactory;
    use crate::manager::WidgetManager;
    use crate::services::HoverRequest;
    use crate::shell::AddWidgetOptions;
    use crate::widget::{WidgetBehavior, WidgetId};
    use std::sync::atomic::AtomicUsize;
    use wharf_core::{MemoryStorage, Uri};

    struct Labeled(&'static str);
    impl WidgetBehavior for Labeled {
        fn render(&self, area: Rect, surface: &mut Surface) {
            surface.put_str(area, area.x, area.y, self.0);
        }
    }

    fn fixture() -> ViewManager {
        let manager = WidgetManager::new();
        manager.register_factory(
            WidgetFactory::for_pattern(Area::ActivityBar, "wharf:*")
                .with_behavior(|| Box::new(Labeled("~bar~"))),
        );
        manager.register_factory(
            WidgetFactory::for_pattern(Area::Main, "doc:*")
                .with_behavior(|| Box::new(Labeled("body"))),
        );
        let shell = ApplicationShell::new(manager, ShellConfig::default());
        let renderer = ViewRenderer::new();
        let restorer = LayoutRestorer::new(shell.clone(), Arc::new(MemoryStorage::new()));
        ViewManager::new(shell, renderer, restorer, HoverService::new(2))
    }

    #[tokio::test]
    async fn init_resolves_regions_then_fires_ready() {
        let view = fixture();
        let inits = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&inits);
        let _sub = view.on_did_init().subscribe(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        view.init().await.unwrap();
        assert!(view.is_initialized());
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(view.shell().panel_widgets(Area::ActivityBar).len(), 1);
        assert_eq!(view.shell().panel_widgets(Area::StatusBar).len(), 1);

        // Second init must not duplicate region content.
        view.init().await.unwrap();
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(view.shell().panel_widgets(Area::ActivityBar).len(), 1);
    }

    #[tokio::test]
    async fn frame_shows_tabs_bodies_and_bars() {
        let view = fixture();
        view.init().await.unwrap();

        let widget = view
            .shell()
            .manager()
            .get_or_create_widget(&Uri::parse("doc:///a").unwrap())
            .await
            .unwrap();
        view.shell()
            .add_widget(&widget, AddWidgetOptions::new(Area::Main))
            .unwrap();
        view.renderer().mount(&widget);
        view.shell().activate_widget(&WidgetId::new("doc:///a"));

        let mut surface = Surface::new(80, 24);
        view.render_frame(&mut surface);

        // Main tab bar sits just under the top bar row.
        assert!(surface.row_text(1).contains("[a]"));
        assert!(surface.row_text(2).contains("body"));
        // Activity bar content renders in its strip.
        assert!(surface.row_text(1).starts_with('~'));
    }

    #[tokio::test]
    async fn hover_popup_lands_on_top() {
        let view = fixture();
        view.init().await.unwrap();
        view.hover().request_hover(HoverRequest {
            target: WidgetId::new("doc:///a"),
            content: "tooltip".to_owned(),
            anchor: (10, 4),
        });
        view.tick();
        view.tick();

        let mut surface = Surface::new(80, 24);
        view.render_frame(&mut surface);
        assert!(surface.row_text(5).contains("tooltip"));
    }
}
