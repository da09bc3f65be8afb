#![forbid(unsafe_code)]
//! Widget factories.
//!
//! A factory binds a URI match to a shell region and a way of producing the
//! widget's behavior. Registration order matters: the widget manager asks
//! factories in order and the first match wins.
//!
//! Three creation strategies exist, tried in a fixed priority:
//!
//! 1. `create`: async, URI-aware. For widgets that load something.
//! 2. `behavior`: sync constructor. For self-contained widgets.
//! 3. `render`: bare draw closure. For static chrome like bars.
//!
//! A factory with no strategy at all is a configuration error surfaced as
//! [`WidgetError::NoStrategy`] at creation time, not at registration time,
//! mirroring how a missing factory surfaces only when a URI is opened.

use crate::area::Area;
use crate::error::WidgetError;
use crate::widget::{WidgetBehavior, WidgetId};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use wharf_core::{Rect, Surface, Uri};

/// Async, URI-aware creation strategy.
pub type CreateFn =
    Arc<dyn Fn(Uri) -> BoxFuture<'static, Result<Box<dyn WidgetBehavior>, WidgetError>> + Send + Sync>;

/// Sync constructor strategy.
pub type BehaviorFn = Arc<dyn Fn() -> Box<dyn WidgetBehavior> + Send + Sync>;

/// Bare draw closure strategy.
pub type RenderFn = Arc<dyn Fn(Rect, &mut Surface) + Send + Sync>;

/// Custom widget-id derivation, overriding the default "URI without query".
pub type WidgetIdFn = Arc<dyn Fn(&Uri) -> WidgetId + Send + Sync>;

/// How a factory claims URIs.
#[derive(Clone)]
pub enum UriMatch {
    /// Segment pattern, e.g. `doc://*/notes/:name` or `logs:/tail/*`.
    Pattern(String),
    /// Arbitrary predicate for matches a pattern cannot express.
    Predicate(Arc<dyn Fn(&Uri) -> bool + Send + Sync>),
}

impl UriMatch {
    /// Build a predicate matcher.
    #[must_use]
    pub fn predicate(f: impl Fn(&Uri) -> bool + Send + Sync + 'static) -> Self {
        UriMatch::Predicate(Arc::new(f))
    }

    #[must_use]
    pub fn accepts(&self, uri: &Uri) -> bool {
        match self {
            UriMatch::Pattern(pattern) => uri.match_pattern(pattern).is_some(),
            UriMatch::Predicate(f) => f(uri),
        }
    }
}

impl fmt::Debug for UriMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriMatch::Pattern(pattern) => f.debug_tuple("Pattern").field(pattern).finish(),
            UriMatch::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Declarative toolbar entry contributed by a factory for its widgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarItem {
    pub label: String,
    pub icon: Option<String>,
    /// Command executed when the item is triggered.
    pub command_id: String,
}

impl ToolbarItem {
    #[must_use]
    pub fn new(label: impl Into<String>, command_id: impl Into<String>) -> Self {
        ToolbarItem {
            label: label.into(),
            icon: None,
            command_id: command_id.into(),
        }
    }
}

/// Recipe for widgets of one kind.
pub struct WidgetFactory {
    area: Area,
    matcher: UriMatch,
    create: Option<CreateFn>,
    behavior: Option<BehaviorFn>,
    render: Option<RenderFn>,
    widget_id: Option<WidgetIdFn>,
    toolbar_items: Vec<ToolbarItem>,
}

impl WidgetFactory {
    /// A factory for `area` claiming URIs per `matcher`, with no creation
    /// strategy yet.
    #[must_use]
    pub fn new(area: Area, matcher: UriMatch) -> Self {
        WidgetFactory {
            area,
            matcher,
            create: None,
            behavior: None,
            render: None,
            widget_id: None,
            toolbar_items: Vec::new(),
        }
    }

    /// Shorthand for a pattern-matched factory.
    #[must_use]
    pub fn for_pattern(area: Area, pattern: impl Into<String>) -> Self {
        Self::new(area, UriMatch::Pattern(pattern.into()))
    }

    // --- Builder ---

    #[must_use]
    pub fn with_create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Uri) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn WidgetBehavior>, WidgetError>> + Send + 'static,
    {
        self.create = Some(Arc::new(move |uri| f(uri).boxed()));
        self
    }

    #[must_use]
    pub fn with_behavior<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Box<dyn WidgetBehavior> + Send + Sync + 'static,
    {
        self.behavior = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_render<F>(mut self, f: F) -> Self
    where
        F: Fn(Rect, &mut Surface) + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_widget_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&Uri) -> WidgetId + Send + Sync + 'static,
    {
        self.widget_id = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_toolbar_item(mut self, item: ToolbarItem) -> Self {
        self.toolbar_items.push(item);
        self
    }

    // --- Queries ---

    #[must_use]
    pub fn area(&self) -> Area {
        self.area
    }

    #[must_use]
    pub fn can_handle(&self, uri: &Uri) -> bool {
        self.matcher.accepts(uri)
    }

    #[must_use]
    pub fn toolbar_items(&self) -> &[ToolbarItem] {
        &self.toolbar_items
    }

    /// Factory-specific widget id for `uri`, if the factory overrides the
    /// default derivation.
    #[must_use]
    pub fn custom_widget_id(&self, uri: &Uri) -> Option<WidgetId> {
        self.widget_id.as_ref().map(|f| f(uri))
    }

    /// Run the highest-priority strategy this factory declares.
    pub(crate) fn produce(
        &self,
        uri: Uri,
    ) -> BoxFuture<'static, Result<Box<dyn WidgetBehavior>, WidgetError>> {
        if let Some(create) = &self.create {
            return create(uri);
        }
        if let Some(behavior) = &self.behavior {
            let behavior = Arc::clone(behavior);
            return async move { Ok(behavior()) }.boxed();
        }
        if let Some(render) = &self.render {
            let render = Arc::clone(render);
            return async move {
                Ok(Box::new(RenderFnBehavior { render }) as Box<dyn WidgetBehavior>)
            }
            .boxed();
        }
        let uri = uri.to_string();
        async move { Err(WidgetError::NoStrategy(uri)) }.boxed()
    }
}

impl fmt::Debug for WidgetFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetFactory")
            .field("area", &self.area)
            .field("matcher", &self.matcher)
            .field("has_create", &self.create.is_some())
            .field("has_behavior", &self.behavior.is_some())
            .field("has_render", &self.render.is_some())
            .finish()
    }
}

/// Behavior produced by the bare `render` strategy.
struct RenderFnBehavior {
    render: RenderFn,
}

impl WidgetBehavior for RenderFnBehavior {
    fn render(&self, area: Rect, surface: &mut Surface) {
        (self.render)(area, surface);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
