#![forbid(unsafe_code)]
//! Widget manager: factory registry, widget registry, and deduplicated
//! asynchronous creation.
//!
//! Creation is single-flight per widget id. The first request for an id
//! installs a shared future; every concurrent request for the same id joins
//! it, so a factory runs at most once no matter how many callers race. The
//! in-flight marker is cleared when the future settles, on success and on
//! failure, so a failed creation can be retried.
//!
//! Widget identity is the URI with its query stripped (a factory may
//! override this). Query parameters act as open options, not identity:
//! `doc:/a?line=3` and `doc:/a?line=9` are the same widget.
//!
//! # Invariants
//!
//! | # | Invariant |
//! |---|-----------|
//! | 1 | At most one creation runs per widget id at any time. |
//! | 2 | Registry lock is never held across an await. |
//! | 3 | A settled creation leaves no in-flight marker behind. |
//! | 4 | Disposing a widget removes it from the registry and fires the removal event. |

use crate::error::WidgetError;
use crate::factory::WidgetFactory;
use crate::sync::lock;
use crate::widget::{Title, WidgetBehavior, WidgetHandle, WidgetId};
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};
use wharf_core::{Emitter, Uri};

type CreationFuture = BoxFuture<'static, Result<WidgetHandle, WidgetError>>;
type SharedCreation = Shared<CreationFuture>;

struct ManagerState {
    factories: Vec<Arc<WidgetFactory>>,
    widgets: HashMap<WidgetId, WidgetHandle>,
    pending: HashMap<WidgetId, SharedCreation>,
}

struct ManagerInner {
    state: Mutex<ManagerState>,
    on_did_remove: Emitter<WidgetId>,
}

/// Cheap-to-clone handle to the widget manager.
#[derive(Clone)]
pub struct WidgetManager {
    inner: Arc<ManagerInner>,
}

impl Default for WidgetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetManager {
    #[must_use]
    pub fn new() -> Self {
        WidgetManager {
            inner: Arc::new(ManagerInner {
                state: Mutex::new(ManagerState {
                    factories: Vec::new(),
                    widgets: HashMap::new(),
                    pending: HashMap::new(),
                }),
                on_did_remove: Emitter::new(),
            }),
        }
    }

    /// Fired with the widget id after a widget leaves the registry.
    #[must_use]
    pub fn on_did_remove_widget(&self) -> &Emitter<WidgetId> {
        &self.inner.on_did_remove
    }

    // --- Factories ---

    /// Register a factory. Order matters: the first registered factory that
    /// matches a URI wins.
    pub fn register_factory(&self, factory: WidgetFactory) {
        lock(&self.inner.state).factories.push(Arc::new(factory));
    }

    /// First registered factory claiming `uri`.
    #[must_use]
    pub fn get_factory(&self, uri: &Uri) -> Option<Arc<WidgetFactory>> {
        lock(&self.inner.state)
            .factories
            .iter()
            .find(|f| f.can_handle(uri))
            .cloned()
    }

    /// Widget id for `uri`: the claiming factory's custom derivation if it
    /// has one, otherwise the URI with its query stripped.
    #[must_use]
    pub fn uri_to_widget_id(&self, uri: &Uri) -> WidgetId {
        let factory = self.get_factory(uri);
        Self::widget_id_for(factory.as_deref(), uri)
    }

    fn widget_id_for(factory: Option<&WidgetFactory>, uri: &Uri) -> WidgetId {
        if let Some(custom) = factory.and_then(|f| f.custom_widget_id(uri)) {
            return custom;
        }
        WidgetId::new(uri.without_query().to_string())
    }

    // --- Registry ---

    #[must_use]
    pub fn get_widget(&self, id: &WidgetId) -> Option<WidgetHandle> {
        lock(&self.inner.state).widgets.get(id).cloned()
    }

    /// Existing widget for `uri`, if one is registered under its derived id.
    #[must_use]
    pub fn find_widget(&self, uri: &Uri) -> Option<WidgetHandle> {
        self.get_widget(&self.uri_to_widget_id(uri))
    }

    /// Every live widget, in no particular order.
    #[must_use]
    pub fn widgets(&self) -> Vec<WidgetHandle> {
        lock(&self.inner.state).widgets.values().cloned().collect()
    }

    /// Register an externally constructed widget. Returns `false` (and
    /// logs) if the widget has no id or the id is already taken.
    pub fn register_widget(&self, widget: &WidgetHandle) -> bool {
        let Some(id) = widget.id() else {
            warn!("refusing to register a widget without an id");
            return false;
        };
        {
            let state = lock(&self.inner.state);
            if state.widgets.contains_key(&id) {
                warn!(widget = %id, "widget id already registered");
                return false;
            }
        }
        Self::register(&self.inner, widget);
        true
    }

    /// Dispose every registered widget. Dispose listeners empty the
    /// registry as a side effect.
    pub fn dispose_all(&self) {
        let widgets: Vec<WidgetHandle> =
            lock(&self.inner.state).widgets.values().cloned().collect();
        for widget in widgets {
            widget.dispose();
        }
    }

    // --- Creation ---

    /// Resolve `uri` to its widget, creating it through the first matching
    /// factory if needed. Concurrent calls for the same widget id share one
    /// creation.
    pub fn get_or_create_widget(
        &self,
        uri: &Uri,
    ) -> BoxFuture<'static, Result<WidgetHandle, WidgetError>> {
        match self.get_factory(uri) {
            Some(factory) => self.get_or_create_widget_with(uri, factory),
            None => {
                warn!(uri = %uri, "no widget factory registered");
                let uri = uri.to_string();
                async move { Err(WidgetError::NoFactory(uri)) }.boxed()
            }
        }
    }

    /// Like [`get_or_create_widget`](Self::get_or_create_widget) with the
    /// factory already resolved by the caller.
    pub fn get_or_create_widget_with(
        &self,
        uri: &Uri,
        factory: Arc<WidgetFactory>,
    ) -> BoxFuture<'static, Result<WidgetHandle, WidgetError>> {
        let id = Self::widget_id_for(Some(&factory), uri);
        self.get_or_create_inner(id, uri, move |uri| factory.produce(uri))
    }

    /// Create (or return) a widget owned by another widget, for container
    /// widgets that nest children. The child shares the ordinary registry
    /// and identity rules but bypasses factory matching.
    pub fn create_sub_widget(
        &self,
        uri: &Uri,
        make: impl FnOnce() -> Box<dyn WidgetBehavior> + Send + 'static,
    ) -> BoxFuture<'static, Result<WidgetHandle, WidgetError>> {
        let id = WidgetId::new(uri.without_query().to_string());
        self.get_or_create_inner(id, uri, move |_uri| async move { Ok(make()) }.boxed())
    }

    fn get_or_create_inner(
        &self,
        id: WidgetId,
        uri: &Uri,
        produce: impl FnOnce(Uri) -> BoxFuture<'static, Result<Box<dyn WidgetBehavior>, WidgetError>>
            + Send
            + 'static,
    ) -> BoxFuture<'static, Result<WidgetHandle, WidgetError>> {
        let mut state = lock(&self.inner.state);
        if let Some(widget) = state.widgets.get(&id) {
            let widget = widget.clone();
            return async move { Ok(widget) }.boxed();
        }
        if let Some(inflight) = state.pending.get(&id) {
            trace!(widget = %id, "joining in-flight widget creation");
            return Box::pin(inflight.clone());
        }

        let inner = Arc::clone(&self.inner);
        let uri = uri.clone();
        let creation_id = id.clone();
        let creation: SharedCreation = async move {
            let result = async {
                let mut behavior = produce(uri.clone()).await?;
                behavior.init(&uri).await?;
                let title = behavior
                    .title()
                    .unwrap_or_else(|| Title::new(uri.display_name()));
                let widget = WidgetHandle::with_id(creation_id.clone(), uri.clone(), behavior);
                widget.update_title(|t| *t = title);
                Self::register(&inner, &widget);
                debug!(widget = %creation_id, uri = %uri, "widget created");
                Ok(widget)
            }
            .await;
            if let Err(err) = &result {
                warn!(widget = %creation_id, error = %err, "widget creation failed");
            }
            // Settled either way: clear the in-flight marker so later
            // requests can retry after a failure.
            lock(&inner.state).pending.remove(&creation_id);
            result
        }
        .boxed()
        .shared();

        state.pending.insert(id, creation.clone());
        drop(state);
        Box::pin(creation)
    }

    fn register(inner: &Arc<ManagerInner>, widget: &WidgetHandle) {
        let Some(id) = widget.id() else { return };
        lock(&inner.state).widgets.insert(id.clone(), widget.clone());

        let weak_inner = Arc::downgrade(inner);
        widget
            .events()
            .on_dispose
            .subscribe(move |_| {
                if let Some(inner) = weak_inner.upgrade() {
                    let removed = lock(&inner.state).widgets.remove(&id).is_some();
                    if removed {
                        inner.on_did_remove.fire(&id);
                    }
                }
            })
            .detach();
    }
}

impl fmt::Debug for WidgetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("WidgetManager")
            .field("factories", &state.factories.len())
            .field("widgets", &state.widgets.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Area;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use wharf_core::{Rect, Surface};

    struct Blank;

    impl WidgetBehavior for Blank {
        fn render(&self, _area: Rect, _surface: &mut Surface) {}
    }

    fn counting_factory(created: Arc<AtomicUsize>) -> WidgetFactory {
        WidgetFactory::for_pattern(Area::Main, "doc:/*").with_create(move |_uri| {
            let created = Arc::clone(&created);
            async move {
                // Yield so concurrent racers get a chance to interleave.
                tokio::task::yield_now().await;
                created.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(Blank) as Box<dyn WidgetBehavior>)
            }
        })
    }

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_creation() {
        let manager = WidgetManager::new();
        let created = Arc::new(AtomicUsize::new(0));
        manager.register_factory(counting_factory(Arc::clone(&created)));

        let target = uri("doc:/notes");
        let requests: Vec<_> = (0..16)
            .map(|_| manager.get_or_create_widget(&target))
            .collect();
        let results = join_all(requests).await;

        assert_eq!(created.load(Ordering::SeqCst), 1);
        let first = results[0].as_ref().unwrap().clone();
        for result in &results {
            assert_eq!(result.as_ref().unwrap(), &first);
        }
        assert_eq!(manager.widgets().len(), 1);
    }

    #[tokio::test]
    async fn query_parameters_do_not_change_identity() {
        let manager = WidgetManager::new();
        let created = Arc::new(AtomicUsize::new(0));
        manager.register_factory(counting_factory(Arc::clone(&created)));

        let a = manager.get_or_create_widget(&uri("doc:/notes?line=3")).await.unwrap();
        let b = manager.get_or_create_widget(&uri("doc:/notes?line=9")).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(a.id().unwrap().as_str(), "doc:///notes");
    }

    #[tokio::test]
    async fn custom_id_derivation_wins() {
        let manager = WidgetManager::new();
        let factory = WidgetFactory::for_pattern(Area::Main, "doc:/*")
            .with_behavior(|| Box::new(Blank))
            .with_widget_id(|u| WidgetId::new(format!("pinned-{}", u.display_name())));
        manager.register_factory(factory);

        let w = manager.get_or_create_widget(&uri("doc:/todo?x=1")).await.unwrap();
        assert_eq!(w.id().unwrap().as_str(), "pinned-todo");
        assert_eq!(manager.uri_to_widget_id(&uri("doc:/todo")).as_str(), "pinned-todo");
    }

    #[tokio::test]
    async fn no_matching_factory_is_an_error() {
        let manager = WidgetManager::new();
        let err = manager.get_or_create_widget(&uri("doc:/a")).await.unwrap_err();
        assert!(matches!(err, WidgetError::NoFactory(_)));
    }

    #[tokio::test]
    async fn failed_creation_clears_the_inflight_marker() {
        let manager = WidgetManager::new();
        let fail = Arc::new(AtomicBool::new(true));
        let gate = Arc::clone(&fail);
        manager.register_factory(WidgetFactory::for_pattern(Area::Main, "doc:/*").with_create(
            move |uri| {
                let gate = Arc::clone(&gate);
                async move {
                    if gate.load(Ordering::SeqCst) {
                        Err(WidgetError::CreationFailed {
                            uri: uri.to_string(),
                            reason: "backend offline".into(),
                        })
                    } else {
                        Ok(Box::new(Blank) as Box<dyn WidgetBehavior>)
                    }
                }
            },
        ));

        let target = uri("doc:/flaky");
        let err = manager.get_or_create_widget(&target).await.unwrap_err();
        assert!(matches!(err, WidgetError::CreationFailed { .. }));
        assert!(manager.find_widget(&target).is_none());

        fail.store(false, Ordering::SeqCst);
        let widget = manager.get_or_create_widget(&target).await.unwrap();
        assert_eq!(widget.id().unwrap().as_str(), "doc:///flaky");
    }

    #[tokio::test]
    async fn failures_fan_out_to_every_waiter() {
        let manager = WidgetManager::new();
        manager.register_factory(WidgetFactory::for_pattern(Area::Main, "doc:/*").with_create(
            |uri| async move {
                tokio::task::yield_now().await;
                Err(WidgetError::CreationFailed {
                    uri: uri.to_string(),
                    reason: "nope".into(),
                })
            },
        ));

        let target = uri("doc:/a");
        let requests: Vec<_> = (0..4)
            .map(|_| manager.get_or_create_widget(&target))
            .collect();
        for result in join_all(requests).await {
            assert!(matches!(result, Err(WidgetError::CreationFailed { .. })));
        }
    }

    #[tokio::test]
    async fn dispose_unregisters_and_fires_removal() {
        let manager = WidgetManager::new();
        let created = Arc::new(AtomicUsize::new(0));
        manager.register_factory(counting_factory(Arc::clone(&created)));

        let removed: Arc<Mutex<Vec<WidgetId>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        let _sub = manager.on_did_remove_widget().subscribe(move |id| {
            sink.lock().unwrap().push(id.clone());
        });

        let target = uri("doc:/gone");
        let widget = manager.get_or_create_widget(&target).await.unwrap();
        widget.dispose();

        assert!(manager.find_widget(&target).is_none());
        assert_eq!(
            removed.lock().unwrap().as_slice(),
            &[WidgetId::from("doc:///gone")]
        );

        // A later request builds a fresh widget.
        let fresh = manager.get_or_create_widget(&target).await.unwrap();
        assert_ne!(fresh, widget);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn externally_built_widgets_can_be_registered() {
        let manager = WidgetManager::new();
        let target = uri("ext:/panel");
        let handle = WidgetHandle::with_id(
            WidgetId::new("ext:///panel"),
            target.clone(),
            Box::new(Blank),
        );

        assert!(manager.register_widget(&handle));
        assert_eq!(manager.find_widget(&target), Some(handle.clone()));

        // A second registration under the same id is refused.
        assert!(!manager.register_widget(&handle));

        // So is a handle that never got an id.
        let anonymous = WidgetHandle::new(Box::new(Blank));
        assert!(!manager.register_widget(&anonymous));

        // External widgets leave the registry on dispose like any other.
        handle.dispose();
        assert!(manager.find_widget(&target).is_none());
    }

    #[tokio::test]
    async fn sub_widgets_are_idempotent_per_uri() {
        let manager = WidgetManager::new();
        let child = uri("split:/root/0");

        let a = manager
            .create_sub_widget(&child, || Box::new(Blank) as Box<dyn WidgetBehavior>)
            .await
            .unwrap();
        let b = manager
            .create_sub_widget(&child, || Box::new(Blank) as Box<dyn WidgetBehavior>)
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(manager.widgets().len(), 1);
    }

    #[test]
    fn default_title_comes_from_the_uri() {
        struct Titled;
        impl WidgetBehavior for Titled {
            fn title(&self) -> Option<Title> {
                Some(Title::new("Custom"))
            }
            fn render(&self, _area: Rect, _surface: &mut Surface) {}
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let manager = WidgetManager::new();
            manager.register_factory(
                WidgetFactory::for_pattern(Area::Main, "doc:/*").with_behavior(|| Box::new(Blank)),
            );
            manager.register_factory(
                WidgetFactory::for_pattern(Area::Main, "titled:/*")
                    .with_behavior(|| Box::new(Titled)),
            );

            let plain = manager
                .get_or_create_widget(&uri("doc:/reports/summary"))
                .await
                .unwrap();
            assert_eq!(plain.title().label, "summary");

            let custom = manager
                .get_or_create_widget(&uri("titled:/x"))
                .await
                .unwrap();
            assert_eq!(custom.title().label, "Custom");
        });
    }
}
