//! Whole-workbench integration tests.
//!
//! Everything here goes through the [`Workbench`] facade the way an
//! embedding application would: register factories, init, open URIs,
//! drive shortcuts, tear down, come back on the same storage.
//!
//! # Invariants
//!
//! 1. **Single-flight creation**: concurrent opens of one URI run the
//!    factory once and share the instance.
//! 2. **Query-stripped identity**: query variants of a URI resolve to the
//!    same widget.
//! 3. **Round-trip persistence**: regions and widget state survive a full
//!    dispose/rebuild cycle on the same storage.
//! 4. **No dangling current**: the current widget is never a disposed one.
//! 5. **Closed-stack dedup**: a URI appears at most once in the reopen
//!    stack.
//! 6. **Version gate**: a newer persisted layout is ignored wholesale.
//! 7. **Partial-failure tolerance**: unresolvable slots drop, the rest
//!    restore.
//! 8. **Sidebar toggle**: reopening a visible sidebar widget hides it;
//!    siblings are exclusive.

#![cfg(test)]

use futures_util::future::join_all;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wharf_core::{MemoryStorage, Rect, StorageBackend, Surface, Uri};
use wharf_shell::{
    Area, KeyCombo, ShellConfig, Stateful, WidgetBehavior, WidgetFactory, Workbench,
};

struct TextPane(&'static str);

impl WidgetBehavior for TextPane {
    fn render(&self, area: Rect, surface: &mut Surface) {
        surface.put_str(area, area.x, area.y, self.0);
    }
}

fn note_factory() -> WidgetFactory {
    WidgetFactory::for_pattern(Area::Main, "note:*").with_behavior(|| Box::new(TextPane("note")))
}

fn workbench_with_notes() -> Workbench {
    let workbench = Workbench::new(Arc::new(MemoryStorage::new()));
    workbench.register_factory(note_factory());
    workbench
}

// ─────────────────────────────────────────────────────────────────────────────
// Creation identity
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_opens_share_one_creation() {
    let workbench = Workbench::new(Arc::new(MemoryStorage::new()));
    let creations = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&creations);
    workbench.register_factory(
        WidgetFactory::for_pattern(Area::Main, "slow:*").with_create(move |_uri| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Box::new(TextPane("slow")) as Box<dyn WidgetBehavior>)
            }
        }),
    );
    workbench.init().await.unwrap();

    let uri = Uri::parse("slow:///doc").unwrap();
    let opens = (0..4).map(|_| workbench.open(&uri));
    let widgets: Vec<_> = join_all(opens)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(creations.load(Ordering::SeqCst), 1);
    let first = widgets[0].id().unwrap();
    assert!(widgets.iter().all(|w| w.id().unwrap() == first));
    assert_eq!(workbench.manager().widgets().len(), 1);
}

#[tokio::test]
async fn query_variants_resolve_to_the_same_widget() {
    let workbench = workbench_with_notes();
    workbench.init().await.unwrap();

    let plain = workbench
        .open(&Uri::parse("note:///plan").unwrap())
        .await
        .unwrap();
    let tabbed = workbench
        .open(&Uri::parse("note:///plan?tab=2").unwrap())
        .await
        .unwrap();

    assert_eq!(plain.id(), tabbed.id());
    assert_eq!(workbench.manager().widgets().len(), 1);
    assert_eq!(workbench.shell().main_dock().widgets().len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence round trips
// ─────────────────────────────────────────────────────────────────────────────

struct ScrollPane {
    scroll: u32,
    seen: Arc<Mutex<Option<Value>>>,
}

impl WidgetBehavior for ScrollPane {
    fn render(&self, area: Rect, surface: &mut Surface) {
        surface.put_str(area, area.x, area.y, "scroll");
    }

    fn stateful(&mut self) -> Option<&mut dyn Stateful> {
        Some(self)
    }
}

impl Stateful for ScrollPane {
    fn store_state(&self) -> Option<Value> {
        Some(json!({ "scroll": self.scroll }))
    }

    fn restore_state(&mut self, state: Value) {
        *self.seen.lock().unwrap() = Some(state);
    }
}

fn scroll_factory(scroll: u32, seen: Arc<Mutex<Option<Value>>>) -> WidgetFactory {
    WidgetFactory::for_pattern(Area::Main, "doc:*").with_behavior(move || {
        Box::new(ScrollPane {
            scroll,
            seen: Arc::clone(&seen),
        })
    })
}

#[tokio::test]
async fn layout_and_widget_state_survive_a_restart() {
    let storage: Arc<MemoryStorage> = Arc::new(MemoryStorage::new());
    let seen = Arc::new(Mutex::new(None));

    {
        let workbench = Workbench::new(storage.clone());
        workbench.register_factory(scroll_factory(42, Arc::clone(&seen)));
        workbench.register_factory(
            WidgetFactory::for_pattern(Area::Bottom, "log:*")
                .with_behavior(|| Box::new(TextPane("log"))),
        );
        workbench.init().await.unwrap();
        workbench
            .open(&Uri::parse("doc:///spec").unwrap())
            .await
            .unwrap();
        workbench
            .open(&Uri::parse("log:///build").unwrap())
            .await
            .unwrap();
        workbench.dispose();
    }

    let workbench = Workbench::new(storage);
    workbench.register_factory(scroll_factory(0, Arc::clone(&seen)));
    workbench.register_factory(
        WidgetFactory::for_pattern(Area::Bottom, "log:*")
            .with_behavior(|| Box::new(TextPane("log"))),
    );
    let summary = workbench.init().await.unwrap();

    assert!(summary.applied);
    assert_eq!(summary.restored_widgets, 2);
    assert_eq!(
        workbench.shell().area_of(
            &workbench
                .manager()
                .find_widget(&Uri::parse("doc:///spec").unwrap())
                .unwrap()
                .id()
                .unwrap()
        ),
        Some(Area::Main)
    );
    assert_eq!(
        workbench.shell().area_of(
            &workbench
                .manager()
                .find_widget(&Uri::parse("log:///build").unwrap())
                .unwrap()
                .id()
                .unwrap()
        ),
        Some(Area::Bottom)
    );
    // The stored snapshot came back byte-for-byte.
    assert_eq!(*seen.lock().unwrap(), Some(json!({ "scroll": 42 })));
}

#[tokio::test]
async fn newer_layout_version_is_ignored_wholesale() {
    let storage: Arc<MemoryStorage> = Arc::new(MemoryStorage::new());
    storage
        .save(
            "layout",
            r#"{
                "version": 9.9,
                "main_panel": {
                    "mode": "multiple-document",
                    "root": {
                        "kind": "tab-area",
                        "widgets": [{ "uri": "note:///from-the-future" }]
                    }
                },
                "bottom_panel": { "layout": { "mode": "multiple-document" } }
            }"#,
        )
        .unwrap();

    let workbench = Workbench::new(storage);
    workbench.register_factory(note_factory());
    let summary = workbench.init().await.unwrap();

    assert!(!summary.applied);
    assert_eq!(summary.restored_widgets, 0);
    assert!(workbench.shell().main_dock().widgets().is_empty());
}

#[tokio::test]
async fn unresolvable_slots_drop_but_the_rest_restores() {
    let storage: Arc<MemoryStorage> = Arc::new(MemoryStorage::new());

    {
        let workbench = Workbench::new(storage.clone());
        workbench.register_factory(note_factory());
        workbench.register_factory(
            WidgetFactory::for_pattern(Area::Main, "scratch:*")
                .with_behavior(|| Box::new(TextPane("scratch"))),
        );
        workbench.init().await.unwrap();
        workbench
            .open(&Uri::parse("note:///keep").unwrap())
            .await
            .unwrap();
        workbench
            .open(&Uri::parse("scratch:///gone").unwrap())
            .await
            .unwrap();
        workbench.dispose();
    }

    // Second session: nothing claims scratch URIs anymore.
    let workbench = Workbench::new(storage);
    workbench.register_factory(note_factory());
    let summary = workbench.init().await.unwrap();

    assert!(summary.applied);
    assert_eq!(summary.restored_widgets, 1);
    assert_eq!(summary.dropped_widgets, 1);
    assert_eq!(summary.failed_uris, vec!["scratch:///gone".to_owned()]);

    let main = workbench.shell().main_dock().widgets();
    assert_eq!(main.len(), 1);
    assert_eq!(
        main[0].uri().map(|u| u.to_string()),
        Some("note:///keep".to_owned())
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Current-widget discipline
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn current_never_points_at_a_disposed_widget() {
    let workbench = workbench_with_notes();
    workbench.init().await.unwrap();

    let a = workbench
        .open(&Uri::parse("note:///a").unwrap())
        .await
        .unwrap();
    let b = workbench
        .open(&Uri::parse("note:///b").unwrap())
        .await
        .unwrap();
    assert_eq!(
        workbench.shell().current_widget().and_then(|w| w.id()),
        b.id()
    );

    // Disposing the current widget moves current to a live sibling.
    b.dispose();
    let current = workbench.shell().current_widget();
    assert_eq!(current.as_ref().and_then(|w| w.id()), a.id());
    assert!(current.is_some_and(|w| !w.is_disposed()));

    // Disposing the last widget leaves no current at all.
    a.dispose();
    assert!(workbench.shell().current_widget().is_none());
}

#[tokio::test]
async fn closed_stack_keeps_one_entry_per_uri() {
    let workbench = workbench_with_notes();
    workbench.init().await.unwrap();

    let a_uri = Uri::parse("note:///a").unwrap();
    let b_uri = Uri::parse("note:///b").unwrap();

    let a = workbench.open(&a_uri).await.unwrap();
    workbench.open(&b_uri).await.unwrap();
    a.dispose();

    let a = workbench.open(&a_uri).await.unwrap();
    workbench
        .manager()
        .find_widget(&b_uri)
        .unwrap()
        .dispose();
    a.dispose();

    let closed: Vec<String> = workbench
        .shell()
        .closed_uris()
        .iter()
        .map(Uri::to_string)
        .collect();
    assert_eq!(closed, vec!["note:///b".to_owned(), "note:///a".to_owned()]);

    // Reopen pops most-recently-closed first.
    let reopened = workbench.view_service().reopen_last_tab().await.unwrap();
    assert_eq!(
        reopened.uri().map(|u| u.to_string()),
        Some("note:///a".to_owned())
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Sidebars
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sidebar_open_toggles_and_siblings_stay_exclusive() {
    let workbench = Workbench::new(Arc::new(MemoryStorage::new()));
    workbench.register_factory(
        WidgetFactory::for_pattern(Area::PrimarySidebar, "tool:*")
            .with_behavior(|| Box::new(TextPane("tool"))),
    );
    workbench.init().await.unwrap();

    let files_uri = Uri::parse("tool:///files").unwrap();
    let files = workbench.open(&files_uri).await.unwrap();
    assert_eq!(
        workbench
            .shell()
            .sidebar_visible_widget(Area::PrimarySidebar)
            .and_then(|w| w.id()),
        files.id()
    );

    // Opening the visible widget again collapses the sidebar.
    workbench.open(&files_uri).await.unwrap();
    assert!(workbench
        .shell()
        .sidebar_visible_widget(Area::PrimarySidebar)
        .is_none());

    // And once more brings it back.
    workbench.open(&files_uri).await.unwrap();
    assert!(workbench
        .shell()
        .sidebar_visible_widget(Area::PrimarySidebar)
        .is_some());

    // A sibling takes the slot; the first widget hides but stays attached.
    let search = workbench
        .open(&Uri::parse("tool:///search").unwrap())
        .await
        .unwrap();
    assert_eq!(
        workbench
            .shell()
            .sidebar_visible_widget(Area::PrimarySidebar)
            .and_then(|w| w.id()),
        search.id()
    );
    assert!(!files.is_visible());
    assert!(files.is_attached());
}

// ─────────────────────────────────────────────────────────────────────────────
// Shortcuts and frames
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn tab_cycle_shortcuts_move_the_current_widget() {
    let workbench = workbench_with_notes();
    workbench.init().await.unwrap();

    let a = workbench
        .open(&Uri::parse("note:///a").unwrap())
        .await
        .unwrap();
    let b = workbench
        .open(&Uri::parse("note:///b").unwrap())
        .await
        .unwrap();

    let next = KeyCombo::parse("alt shift right").unwrap();
    let prev = KeyCombo::parse("alt shift left").unwrap();

    // b is current; next wraps to a, previous comes back to b.
    assert!(workbench.dispatch_key(&next).await);
    assert_eq!(
        workbench.shell().current_widget().and_then(|w| w.id()),
        a.id()
    );
    assert!(workbench.dispatch_key(&prev).await);
    assert_eq!(
        workbench.shell().current_widget().and_then(|w| w.id()),
        b.id()
    );
}

#[tokio::test]
async fn a_frame_shows_tabs_and_content() {
    let workbench = Workbench::with_config(
        Arc::new(MemoryStorage::new()),
        ShellConfig::default(),
    );
    workbench.register_factory(note_factory());
    workbench.init().await.unwrap();
    workbench
        .open(&Uri::parse("note:///readme").unwrap())
        .await
        .unwrap();

    let mut surface = Surface::new(80, 24);
    workbench.render_frame(&mut surface);

    let frame: Vec<String> = (0..24).map(|y| surface.row_text(y)).collect();
    let all = frame.join("\n");
    assert!(all.contains("readme"), "tab label missing:\n{all}");
    assert!(all.contains("note"), "widget body missing:\n{all}");
}
