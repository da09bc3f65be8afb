#![forbid(unsafe_code)]
//! The one entry point for "open this URI".
//!
//! Menus, keybindings, sidebars and the layout restorer all open widgets
//! through here. The handler resolves the factory, creates or re-fetches
//! the widget, mounts its portal and then routes by the factory's target
//! region: dock regions attach, restore inner state, hook persistence and
//! activate; sidebar regions toggle their exclusive widget.

use crate::area::Area;
use crate::dock::DockAddOptions;
use crate::error::{ShellError, WidgetError};
use crate::restorer::LayoutRestorer;
use crate::shell::{AddWidgetOptions, ApplicationShell};
use crate::view::ViewRenderer;
use crate::widget::{WidgetFlags, WidgetHandle};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::debug;
use wharf_core::Uri;

/// Knobs for one open call. The URI's query string carries widget-level
/// open options; this struct carries placement.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Dock placement, honored for dock regions only.
    pub dock: Option<DockAddOptions>,
}

/// Opens widgets by URI. Cheap to clone.
#[derive(Clone)]
pub struct WidgetOpenHandler {
    shell: ApplicationShell,
    renderer: ViewRenderer,
    restorer: LayoutRestorer,
}

impl WidgetOpenHandler {
    #[must_use]
    pub fn new(shell: ApplicationShell, renderer: ViewRenderer, restorer: LayoutRestorer) -> Self {
        WidgetOpenHandler {
            shell,
            renderer,
            restorer,
        }
    }

    /// Whether some factory claims the URI.
    #[must_use]
    pub fn can_open(&self, uri: &Uri) -> bool {
        self.shell.manager().get_factory(uri).is_some()
    }

    /// Open (or re-reveal) the widget for `uri`.
    ///
    /// Dock regions: attach on first open, restore any persisted inner
    /// state, install a store-on-dispose hook, expand a collapsed bottom
    /// panel and activate the tab. Sidebar regions: toggle the widget,
    /// hiding its siblings when it becomes visible.
    pub fn open(
        &self,
        uri: &Uri,
        options: OpenOptions,
    ) -> BoxFuture<'static, Result<WidgetHandle, ShellError>> {
        let this = self.clone();
        let uri = uri.clone();
        async move {
            let Some(factory) = this.shell.manager().get_factory(&uri) else {
                return Err(ShellError::Widget(WidgetError::NoFactory(uri.to_string())));
            };
            let area = factory.area();
            let widget = this
                .shell
                .manager()
                .get_or_create_widget_with(&uri, factory)
                .await?;
            this.renderer.mount(&widget);

            match area {
                Area::Main | Area::Bottom => {
                    if !widget.is_attached() {
                        this.shell.add_widget(
                            &widget,
                            AddWidgetOptions {
                                area,
                                dock: options.dock,
                                dock_mode: None,
                            },
                        )?;
                        this.restorer.restore_widget(&widget);
                    }
                    this.hook_persistence(&widget);
                    if area == Area::Bottom {
                        this.shell.expand_bottom_if_collapsed();
                    }
                    if let Some(id) = widget.id() {
                        this.shell.activate_widget(&id);
                    }
                }
                area if area.is_sidebar() => {
                    this.shell.toggle_in_sidebar(area, &widget);
                }
                area => {
                    if !widget.is_attached() {
                        this.shell.add_widget(&widget, AddWidgetOptions::new(area))?;
                    }
                }
            }
            debug!(uri = %uri, area = %area, "opened");
            Ok(widget)
        }
        .boxed()
    }

    /// Capture the widget's inner state into the restorer whenever it is
    /// disposed. Installed at most once per widget.
    fn hook_persistence(&self, widget: &WidgetHandle) {
        if widget.mark(WidgetFlags::PERSIST_HOOKED) {
            return;
        }
        let restorer = self.restorer.clone();
        let weak = widget.downgrade();
        widget
            .events()
            .on_dispose
            .subscribe(move |_| {
                if let Some(widget) = weak.upgrade() {
                    restorer.store_widget(&widget);
                }
            })
            .detach();
    }
}
