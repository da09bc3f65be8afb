#![forbid(unsafe_code)]
//! The workbench: one fully wired shell instance.
//!
//! Construction builds every subsystem (widget manager, shell, renderer,
//! restorer, open handler, services, registries) against one storage
//! backend and hands out cheap clones. Nothing is global; two workbenches
//! in one process never share state, which is also what makes the tests
//! honest.
//!
//! Lifecycle: `new` wires, `init` brings the regions and the persisted
//! layout up, `dispose` persists the layout one last time and drops every
//! widget.

use crate::commands::{CommandError, CommandRegistry, Key, KeyCombo, KeybindingRegistry, Modifiers};
use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::factory::WidgetFactory;
use crate::manager::WidgetManager;
use crate::open_handler::{OpenOptions, WidgetOpenHandler};
use crate::restorer::{LayoutRestorer, RestoreSummary};
use crate::services::{DragService, HoverService, ViewService};
use crate::shell::ApplicationShell;
use crate::view::{ViewManager, ViewRenderer};
use crate::widget::WidgetHandle;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::{info, warn};
use wharf_core::{StorageBackend, Surface, Uri};

/// One shell instance with all of its services. Cheap to clone.
#[derive(Clone)]
pub struct Workbench {
    manager: WidgetManager,
    shell: ApplicationShell,
    renderer: ViewRenderer,
    restorer: LayoutRestorer,
    open_handler: WidgetOpenHandler,
    hover: HoverService,
    drag: DragService,
    view_service: ViewService,
    view: ViewManager,
    commands: CommandRegistry,
    keybindings: KeybindingRegistry,
}

impl Workbench {
    /// Wire a workbench with the default configuration.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(storage, ShellConfig::default())
    }

    /// Wire a workbench against `storage` with an explicit configuration.
    #[must_use]
    pub fn with_config(storage: Arc<dyn StorageBackend>, config: ShellConfig) -> Self {
        let hover_delay = config.hover_delay_ticks;
        let manager = WidgetManager::new();
        let shell = ApplicationShell::new(manager.clone(), config);
        let renderer = ViewRenderer::new();
        let restorer = LayoutRestorer::new(shell.clone(), storage);
        let open_handler =
            WidgetOpenHandler::new(shell.clone(), renderer.clone(), restorer.clone());
        let view_service = ViewService::new(shell.clone(), open_handler.clone());
        let view = ViewManager::new(
            shell.clone(),
            renderer.clone(),
            restorer.clone(),
            HoverService::new(hover_delay),
        );
        let commands = CommandRegistry::new();
        let keybindings = KeybindingRegistry::new(commands.clone());

        let workbench = Workbench {
            manager,
            shell,
            renderer,
            restorer,
            open_handler,
            hover: view.hover().clone(),
            drag: DragService::new(),
            view_service,
            view,
            commands,
            keybindings,
        };
        if let Err(err) = workbench.install_default_commands() {
            warn!(error = %err, "default command installation incomplete");
        }
        workbench
    }

    // --- Accessors ---

    #[must_use]
    pub fn manager(&self) -> &WidgetManager {
        &self.manager
    }

    #[must_use]
    pub fn shell(&self) -> &ApplicationShell {
        &self.shell
    }

    #[must_use]
    pub fn renderer(&self) -> &ViewRenderer {
        &self.renderer
    }

    #[must_use]
    pub fn restorer(&self) -> &LayoutRestorer {
        &self.restorer
    }

    #[must_use]
    pub fn open_handler(&self) -> &WidgetOpenHandler {
        &self.open_handler
    }

    #[must_use]
    pub fn hover(&self) -> &HoverService {
        &self.hover
    }

    #[must_use]
    pub fn drag(&self) -> &DragService {
        &self.drag
    }

    #[must_use]
    pub fn view_service(&self) -> &ViewService {
        &self.view_service
    }

    #[must_use]
    pub fn view(&self) -> &ViewManager {
        &self.view
    }

    #[must_use]
    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    #[must_use]
    pub fn keybindings(&self) -> &KeybindingRegistry {
        &self.keybindings
    }

    // --- Lifecycle ---

    /// Shorthand for [`WidgetManager::register_factory`].
    pub fn register_factory(&self, factory: WidgetFactory) {
        self.manager.register_factory(factory);
    }

    /// Bring the shell up; see [`ViewManager::init`].
    pub fn init(&self) -> BoxFuture<'static, Result<RestoreSummary, ShellError>> {
        self.view.init()
    }

    /// Open `uri` with default placement.
    pub fn open(&self, uri: &Uri) -> BoxFuture<'static, Result<WidgetHandle, ShellError>> {
        self.open_handler.open(uri, OpenOptions::default())
    }

    /// Advance frame-based timers.
    pub fn tick(&self) {
        self.view.tick();
    }

    /// Draw one frame into `surface`.
    pub fn render_frame(&self, surface: &mut Surface) {
        self.view.render_frame(surface);
    }

    /// Run the command bound to `combo`, if any.
    pub fn dispatch_key(&self, combo: &KeyCombo) -> BoxFuture<'static, bool> {
        self.keybindings.dispatch(combo)
    }

    /// Persist the layout and dispose every widget. The workbench is dead
    /// afterwards; build a new one to come back.
    pub fn dispose(&self) {
        match self.restorer.store_layout() {
            Ok(true) => info!("layout persisted on shutdown"),
            Ok(false) => {}
            Err(err) => warn!(error = %err, "failed to persist layout on shutdown"),
        }
        self.manager.dispose_all();
    }

    // --- Built-in commands ---

    fn install_default_commands(&self) -> Result<(), CommandError> {
        let alt = Modifiers::ALT;
        let alt_shift = Modifiers::ALT | Modifiers::SHIFT;
        let meta = Modifiers::META;
        let meta_alt = Modifiers::META | Modifiers::ALT;

        {
            let svc = self.view_service.clone();
            self.commands
                .register("close-all-tabs", "Close All Tabs", move || {
                    let svc = svc.clone();
                    async move { svc.close_all_tabs() }
                })?;
            self.keybindings
                .bind(KeyCombo::new(alt_shift, Key::Char('w')), "close-all-tabs");
        }
        {
            let svc = self.view_service.clone();
            self.commands
                .register("close-current-tab", "Close Current Tab", move || {
                    let svc = svc.clone();
                    async move { svc.close_current_tab() }
                })?;
            self.keybindings
                .bind(KeyCombo::new(alt, Key::Char('w')), "close-current-tab");
        }
        {
            let svc = self.view_service.clone();
            self.commands
                .register("close-other-tabs", "Close Other Tabs", move || {
                    let svc = svc.clone();
                    async move { svc.close_other_tabs() }
                })?;
            self.keybindings
                .bind(KeyCombo::new(meta_alt, Key::Char('t')), "close-other-tabs");
        }
        {
            let svc = self.view_service.clone();
            self.commands
                .register("reopen-last-tab", "Reopen Last Tab", move || {
                    let svc = svc.clone();
                    async move {
                        svc.reopen_last_tab().await;
                    }
                })?;
            self.keybindings
                .bind(KeyCombo::new(alt_shift, Key::Char('t')), "reopen-last-tab");
        }
        {
            let svc = self.view_service.clone();
            self.commands
                .register("toggle-bottom-panel", "Toggle Bottom Panel", move || {
                    let svc = svc.clone();
                    async move { svc.toggle_bottom_panel() }
                })?;
            self.keybindings
                .bind(KeyCombo::new(meta, Key::Char('j')), "toggle-bottom-panel");
        }
        {
            let svc = self.view_service.clone();
            self.commands
                .register("open-next-tab", "Next Tab", move || {
                    let svc = svc.clone();
                    async move { svc.open_next_tab() }
                })?;
            self.keybindings
                .bind(KeyCombo::new(alt_shift, Key::Right), "open-next-tab");
        }
        {
            let svc = self.view_service.clone();
            self.commands
                .register("open-prev-tab", "Previous Tab", move || {
                    let svc = svc.clone();
                    async move { svc.open_previous_tab() }
                })?;
            self.keybindings
                .bind(KeyCombo::new(alt_shift, Key::Left), "open-prev-tab");
        }
        {
            let svc = self.view_service.clone();
            self.commands
                .register("toggle-full-screen", "Toggle Full Screen", move || {
                    let svc = svc.clone();
                    async move { svc.toggle_full_screen() }
                })?;
            self.keybindings
                .bind(KeyCombo::new(alt, Key::Char('f')), "toggle-full-screen");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Area;
    use crate::widget::{Title, WidgetBehavior};
    use wharf_core::{MemoryStorage, Rect};

    struct NotePane;

    impl WidgetBehavior for NotePane {
        fn title(&self) -> Option<Title> {
            None
        }

        fn render(&self, area: Rect, surface: &mut Surface) {
            surface.put_str(area, area.x, area.y, "note");
        }
    }

    fn fixture() -> Workbench {
        let workbench = Workbench::new(Arc::new(MemoryStorage::new()));
        workbench.register_factory(WidgetFactory::for_pattern(Area::Main, "note:*").with_behavior(
            || Box::new(NotePane),
        ));
        workbench
    }

    #[test]
    fn default_commands_are_installed() {
        let workbench = fixture();
        let commands = workbench.commands().commands();
        assert_eq!(commands.len(), 8);
        assert!(workbench.commands().contains("close-current-tab"));
        assert!(workbench.commands().contains("toggle-full-screen"));
        assert_eq!(workbench.keybindings().bindings().len(), 8);
    }

    #[tokio::test]
    async fn close_current_tab_shortcut_works_end_to_end() {
        let workbench = fixture();
        workbench.init().await.unwrap();

        let a = workbench
            .open(&Uri::parse("note:///a").unwrap())
            .await
            .unwrap();
        workbench
            .open(&Uri::parse("note:///b").unwrap())
            .await
            .unwrap();

        let combo = KeyCombo::parse("alt w").unwrap();
        assert!(workbench.dispatch_key(&combo).await);

        // b was current; after the shortcut only a remains and is current.
        assert_eq!(workbench.shell().main_dock().widgets().len(), 1);
        assert_eq!(
            workbench.shell().current_widget().and_then(|w| w.id()),
            a.id()
        );
    }

    #[tokio::test]
    async fn bottom_panel_shortcut_toggles_visibility() {
        let workbench = fixture();
        workbench.init().await.unwrap();

        let combo = KeyCombo::parse("meta j").unwrap();
        assert!(workbench.dispatch_key(&combo).await);
        assert!(!workbench.shell().is_area_hidden(Area::Bottom));
        assert!(workbench.dispatch_key(&combo).await);
        assert!(workbench.shell().is_area_hidden(Area::Bottom));
    }

    #[tokio::test]
    async fn dispose_persists_and_a_fresh_workbench_restores() {
        let storage = Arc::new(MemoryStorage::new());
        {
            let workbench = Workbench::new(storage.clone());
            workbench.register_factory(
                WidgetFactory::for_pattern(Area::Main, "note:*")
                    .with_behavior(|| Box::new(NotePane)),
            );
            workbench.init().await.unwrap();
            workbench
                .open(&Uri::parse("note:///kept").unwrap())
                .await
                .unwrap();
            workbench.dispose();
            assert!(workbench.manager().widgets().is_empty());
        }

        let reborn = Workbench::new(storage);
        reborn.register_factory(
            WidgetFactory::for_pattern(Area::Main, "note:*").with_behavior(|| Box::new(NotePane)),
        );
        let summary = reborn.init().await.unwrap();
        assert!(summary.applied);
        assert_eq!(reborn.shell().main_dock().widgets().len(), 1);
    }

    #[tokio::test]
    async fn workbench_instances_are_isolated() {
        let one = fixture();
        let two = fixture();
        one.init().await.unwrap();
        two.init().await.unwrap();

        one.open(&Uri::parse("note:///only-in-one").unwrap())
            .await
            .unwrap();
        assert_eq!(one.shell().main_dock().widgets().len(), 1);
        assert!(two.shell().main_dock().widgets().is_empty());
    }
}
