#![forbid(unsafe_code)]
//! Layout persistence: deflating the live shell into a JSON blob and
//! inflating that blob back into live widgets on the next start.
//!
//! Deflation replaces every widget slot in the layout tree with a
//! [`StoredWidget`] description (URI plus opaque inner state). Inflation
//! runs in three passes: collect every description in tree order, resolve
//! them all concurrently through the widget manager, then rebuild the tree
//! patching resolved handles back in by position. A slot whose widget can
//! no longer be created (factory gone, creation failed) is dropped from
//! the rebuilt tree; one bad widget never aborts the whole restore.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Storage read/write error | `RestoreError::Storage` |
//! | Stored blob is not valid JSON | warn, restore skipped |
//! | Stored version newer than this build | warn, restore skipped |
//! | One widget fails to resolve | warn, slot dropped, rest restored |
//! | Restorer administratively disabled | store and restore are no-ops |

use crate::dock::{DockLayoutData, DockMode, DockNode, Orientation, SplitArea, TabArea, TabAreaId};
use crate::error::RestoreError;
use crate::shell::{
    ApplicationShell, BottomPanelLayout, LayoutData, SidebarLayout, SHELL_LAYOUT_VERSION,
};
use crate::widget::WidgetHandle;
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use wharf_core::{StorageBackend, Uri};

/// Key holding the administrative kill switch for layout persistence.
const DISABLED_KEY: &str = "layout/disabled/v2";

// ─────────────────────────────────────────────────────────────────────────────
// Stored (serde) layout mirror
// ─────────────────────────────────────────────────────────────────────────────

/// One widget slot in the persisted tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredWidget {
    uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inner_widget_state: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum StoredDockNode {
    TabArea {
        widgets: Vec<StoredWidget>,
        #[serde(default)]
        current_index: Option<usize>,
    },
    Split {
        orientation: Orientation,
        #[serde(default)]
        sizes: Vec<f64>,
        children: Vec<StoredDockNode>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDockLayout {
    mode: DockMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root: Option<StoredDockNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredBottomPanel {
    layout: StoredDockLayout,
    #[serde(default)]
    expanded: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSidebar {
    #[serde(default)]
    widgets: Vec<StoredWidget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredShellLayout {
    version: f64,
    main_panel: StoredDockLayout,
    bottom_panel: StoredBottomPanel,
    #[serde(default)]
    primary_sidebar: StoredSidebar,
    #[serde(default)]
    left_right_sizes: Vec<f64>,
    #[serde(default)]
    main_bottom_sizes: Vec<f64>,
    /// Inner state of widgets not present in the tree, keyed by URI.
    #[serde(default)]
    inner_state: HashMap<String, Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Preferences
// ─────────────────────────────────────────────────────────────────────────────

/// Input control rendered for a declared preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreferenceKind {
    Switch,
    Input,
    Checkbox,
    #[serde(rename = "option")]
    Select,
}

/// A preference declared by the host, shown in settings UIs and persisted
/// per key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceDecl {
    pub key: String,
    pub label: String,
    pub kind: PreferenceKind,
    #[serde(default)]
    pub default: Value,
    /// Sort position among declared preferences, low first.
    #[serde(default)]
    pub order: i32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Restorer
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one restore attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreSummary {
    /// Whether a layout snapshot was applied to the shell.
    pub applied: bool,
    /// Widgets materialized from the snapshot.
    pub restored_widgets: usize,
    /// Widget slots dropped because their widget failed to resolve.
    pub dropped_widgets: usize,
    /// URIs of the dropped slots.
    pub failed_uris: Vec<String>,
}

impl RestoreSummary {
    fn skipped() -> Self {
        RestoreSummary::default()
    }
}

struct PrefRegistry {
    declared: Vec<PreferenceDecl>,
    values: HashMap<String, Value>,
}

struct RestorerInner {
    shell: ApplicationShell,
    storage: Arc<dyn StorageBackend>,
    /// Suffix appended to every storage key, isolating applications that
    /// share one backend.
    suffix: String,
    /// Inner widget state captured between full persistence cycles,
    /// keyed by URI string. Flushed to storage alongside the layout so a
    /// widget closed and reopened across sessions keeps its state even
    /// when it was absent from the tree at store time.
    inner_state: Mutex<HashMap<String, Value>>,
    prefs: Mutex<PrefRegistry>,
}

/// Persists and restores whole-shell layout snapshots plus declared
/// preferences. Cheap to clone.
#[derive(Clone)]
pub struct LayoutRestorer {
    inner: Arc<RestorerInner>,
}

impl LayoutRestorer {
    #[must_use]
    pub fn new(shell: ApplicationShell, storage: Arc<dyn StorageBackend>) -> Self {
        let suffix = shell.config().storage_suffix.clone();
        LayoutRestorer {
            inner: Arc::new(RestorerInner {
                shell,
                storage,
                suffix,
                inner_state: Mutex::new(HashMap::new()),
                prefs: Mutex::new(PrefRegistry {
                    declared: Vec::new(),
                    values: HashMap::new(),
                }),
            }),
        }
    }

    fn layout_key(&self) -> String {
        format!("layout{}", self.inner.suffix)
    }

    fn pref_key(&self, key: &str) -> String {
        format!("preference/{key}{}", self.inner.suffix)
    }

    // --- Kill switch ---

    /// Whether layout persistence is administratively disabled. Storage
    /// failures read as "not disabled".
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        match self.inner.storage.load(DISABLED_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(err) => {
                warn!(error = %err, "could not read layout kill switch");
                false
            }
        }
    }

    pub fn set_disabled(&self, disabled: bool) -> Result<(), RestoreError> {
        self.inner
            .storage
            .save(DISABLED_KEY, if disabled { "true" } else { "false" })?;
        Ok(())
    }

    // --- Incremental widget state ---

    /// Capture a widget's inner state into the in-memory map. Returns
    /// whether anything was captured.
    pub fn store_widget(&self, widget: &WidgetHandle) -> bool {
        let Some(uri) = widget.uri() else {
            return false;
        };
        let Some(state) = widget.store_state() else {
            return false;
        };
        crate::sync::lock(&self.inner.inner_state).insert(uri.to_string(), state);
        true
    }

    /// Hand a previously captured inner state back to a widget. Returns
    /// whether a state was found for it.
    pub fn restore_widget(&self, widget: &WidgetHandle) -> bool {
        let Some(uri) = widget.uri() else {
            return false;
        };
        let state = crate::sync::lock(&self.inner.inner_state)
            .get(&uri.to_string())
            .cloned();
        match state {
            Some(state) => {
                widget.restore_state(state);
                true
            }
            None => false,
        }
    }

    // --- Full cycle ---

    /// Deflate the live shell layout and persist it. Returns whether a
    /// snapshot was written (`false` when disabled).
    pub fn store_layout(&self) -> Result<bool, RestoreError> {
        if self.is_disabled() {
            debug!("layout persistence disabled, not storing");
            return Ok(false);
        }
        let data = self.inner.shell.get_layout_data();
        let stored = self.deflate(&data);
        let blob = serde_json::to_string(&stored)?;
        self.inner.storage.save(&self.layout_key(), &blob)?;
        info!(widgets = stored_widget_count(&stored), "layout stored");
        Ok(true)
    }

    /// Read, inflate and apply the persisted layout. Malformed or
    /// newer-versioned blobs are skipped with a warning, never an error.
    pub fn restore_layout(&self) -> BoxFuture<'static, Result<RestoreSummary, RestoreError>> {
        let this = self.clone();
        async move {
            if this.is_disabled() {
                debug!("layout persistence disabled, not restoring");
                return Ok(RestoreSummary::skipped());
            }
            let Some(blob) = this.inner.storage.load(&this.layout_key())? else {
                debug!("no stored layout");
                return Ok(RestoreSummary::skipped());
            };
            let mut stored: StoredShellLayout = match serde_json::from_str(&blob) {
                Ok(stored) => stored,
                Err(err) => {
                    warn!(error = %err, "stored layout is malformed, skipping restore");
                    return Ok(RestoreSummary::skipped());
                }
            };
            if stored.version > SHELL_LAYOUT_VERSION {
                warn!(
                    stored = stored.version,
                    current = SHELL_LAYOUT_VERSION,
                    "stored layout version is newer than this build, skipping restore"
                );
                return Ok(RestoreSummary::skipped());
            }

            {
                let map = std::mem::take(&mut stored.inner_state);
                crate::sync::lock(&this.inner.inner_state).extend(map);
            }
            let (data, mut summary) = this.inflate(stored).await;
            summary.applied = this.inner.shell.set_layout_data(data);
            info!(
                restored = summary.restored_widgets,
                dropped = summary.dropped_widgets,
                "layout restore finished"
            );
            Ok(summary)
        }
        .boxed()
    }

    // --- Deflate ---

    fn deflate(&self, data: &LayoutData) -> StoredShellLayout {
        StoredShellLayout {
            version: data.version,
            main_panel: self.deflate_dock(&data.main_panel),
            bottom_panel: StoredBottomPanel {
                layout: self.deflate_dock(&data.bottom_panel.layout),
                expanded: data.bottom_panel.expanded,
            },
            primary_sidebar: StoredSidebar {
                widgets: data
                    .primary_sidebar
                    .widgets
                    .iter()
                    .filter_map(|w| self.deflate_widget(w))
                    .collect(),
            },
            left_right_sizes: data.left_right_sizes.clone(),
            main_bottom_sizes: data.main_bottom_sizes.clone(),
            inner_state: crate::sync::lock(&self.inner.inner_state).clone(),
        }
    }

    fn deflate_dock(&self, data: &DockLayoutData) -> StoredDockLayout {
        StoredDockLayout {
            mode: data.mode,
            current_uri: data.current_uri.as_ref().map(Uri::to_string),
            root: data.root.as_ref().and_then(|n| self.deflate_node(n)),
        }
    }

    fn deflate_node(&self, node: &DockNode) -> Option<StoredDockNode> {
        match node {
            DockNode::Tabs(area) => {
                let widgets: Vec<StoredWidget> = area
                    .widgets
                    .iter()
                    .filter_map(|w| self.deflate_widget(w))
                    .collect();
                if widgets.is_empty() {
                    None
                } else {
                    StoredDockNode::TabArea {
                        widgets,
                        current_index: area.current_index,
                    }
                    .into()
                }
            }
            DockNode::Split(split) => {
                let mut children = Vec::new();
                let mut sizes = Vec::new();
                for (i, child) in split.children.iter().enumerate() {
                    if let Some(stored) = self.deflate_node(child) {
                        children.push(stored);
                        sizes.push(split.sizes.get(i).copied().unwrap_or(0.0));
                    }
                }
                match children.len() {
                    0 => None,
                    1 => children.pop(),
                    _ => StoredDockNode::Split {
                        orientation: split.orientation,
                        sizes,
                        children,
                    }
                    .into(),
                }
            }
        }
    }

    /// A widget slot persists only if the widget has a URI to recreate it
    /// from. Inner state comes from the live behavior, falling back to the
    /// incremental map.
    fn deflate_widget(&self, widget: &WidgetHandle) -> Option<StoredWidget> {
        if widget.is_disposed() {
            return None;
        }
        let Some(uri) = widget.uri() else {
            warn!("widget without a URI cannot be persisted, dropping");
            return None;
        };
        let uri_text = uri.to_string();
        let inner_widget_state = widget.store_state().or_else(|| {
            crate::sync::lock(&self.inner.inner_state)
                .get(&uri_text)
                .cloned()
        });
        Some(StoredWidget {
            uri: uri_text,
            inner_widget_state,
        })
    }

    // --- Inflate ---

    /// Pass 1 collects descriptions, pass 2 resolves them concurrently,
    /// pass 3 rebuilds the tree dropping failed slots.
    async fn inflate(&self, stored: StoredShellLayout) -> (LayoutData, RestoreSummary) {
        let mut descriptions: Vec<StoredWidget> = Vec::new();
        if let Some(root) = &stored.main_panel.root {
            collect_stored(root, &mut descriptions);
        }
        if let Some(root) = &stored.bottom_panel.layout.root {
            collect_stored(root, &mut descriptions);
        }
        descriptions.extend(stored.primary_sidebar.widgets.iter().cloned());

        let manager = self.inner.shell.manager().clone();
        let creations = descriptions.iter().map(|desc| {
            let manager = manager.clone();
            let uri_text = desc.uri.clone();
            async move {
                let uri = match Uri::parse(&uri_text) {
                    Ok(uri) => uri,
                    Err(err) => {
                        warn!(uri = %uri_text, error = %err, "unparseable widget URI, dropping slot");
                        return None;
                    }
                };
                match manager.get_or_create_widget(&uri).await {
                    Ok(widget) => Some(widget),
                    Err(err) => {
                        warn!(uri = %uri_text, error = %err, "widget failed to restore, dropping slot");
                        None
                    }
                }
            }
        });
        let resolved = join_all(creations).await;

        let mut summary = RestoreSummary::skipped();
        for (desc, slot) in descriptions.iter().zip(&resolved) {
            match slot {
                Some(widget) => {
                    summary.restored_widgets += 1;
                    if let Some(state) = desc.inner_widget_state.clone() {
                        widget.restore_state(state.clone());
                        crate::sync::lock(&self.inner.inner_state).insert(desc.uri.clone(), state);
                    }
                    self.inner.shell.track(widget);
                }
                None => {
                    summary.dropped_widgets += 1;
                    summary.failed_uris.push(desc.uri.clone());
                }
            }
        }

        let mut cursor = resolved.into_iter();
        let main_root = stored
            .main_panel
            .root
            .as_ref()
            .and_then(|n| build_node(n, &mut cursor));
        let bottom_root = stored
            .bottom_panel
            .layout
            .root
            .as_ref()
            .and_then(|n| build_node(n, &mut cursor));
        let sidebar_widgets: Vec<WidgetHandle> = cursor.flatten().collect();

        let data = LayoutData {
            version: stored.version,
            main_panel: DockLayoutData {
                mode: stored.main_panel.mode,
                current_uri: parse_uri(stored.main_panel.current_uri.as_deref()),
                root: main_root,
            },
            bottom_panel: BottomPanelLayout {
                layout: DockLayoutData {
                    mode: stored.bottom_panel.layout.mode,
                    current_uri: parse_uri(stored.bottom_panel.layout.current_uri.as_deref()),
                    root: bottom_root,
                },
                expanded: stored.bottom_panel.expanded,
            },
            primary_sidebar: SidebarLayout {
                widgets: sidebar_widgets,
            },
            left_right_sizes: stored.left_right_sizes,
            main_bottom_sizes: stored.main_bottom_sizes,
        };
        (data, summary)
    }

    // --- Preferences ---

    /// Declare a preference. Re-declaring a key replaces the declaration
    /// but keeps any persisted value.
    pub fn register_preference(&self, decl: PreferenceDecl) {
        let mut prefs = crate::sync::lock(&self.inner.prefs);
        if let Some(existing) = prefs.declared.iter_mut().find(|d| d.key == decl.key) {
            *existing = decl;
        } else {
            prefs.declared.push(decl);
        }
    }

    /// Declared preferences, sorted by order then key.
    #[must_use]
    pub fn preferences(&self) -> Vec<PreferenceDecl> {
        let prefs = crate::sync::lock(&self.inner.prefs);
        let mut out = prefs.declared.clone();
        out.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.key.cmp(&b.key)));
        out
    }

    /// Set a preference value. Persisted immediately, not batched with the
    /// layout snapshot.
    pub fn set_preference(&self, key: &str, value: Value) -> Result<(), RestoreError> {
        let blob = serde_json::to_string(&value)?;
        self.inner.storage.save(&self.pref_key(key), &blob)?;
        crate::sync::lock(&self.inner.prefs)
            .values
            .insert(key.to_string(), value);
        Ok(())
    }

    /// Current value of a preference: set value, else persisted value,
    /// else the declared default.
    #[must_use]
    pub fn preference_value(&self, key: &str) -> Option<Value> {
        if let Some(value) = crate::sync::lock(&self.inner.prefs).values.get(key) {
            return Some(value.clone());
        }
        match self.inner.storage.load(&self.pref_key(key)) {
            Ok(Some(blob)) => match serde_json::from_str::<Value>(&blob) {
                Ok(value) => {
                    crate::sync::lock(&self.inner.prefs)
                        .values
                        .insert(key.to_string(), value.clone());
                    return Some(value);
                }
                Err(err) => {
                    warn!(key, error = %err, "stored preference is malformed");
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(key, error = %err, "could not read preference");
            }
        }
        crate::sync::lock(&self.inner.prefs)
            .declared
            .iter()
            .find(|d| d.key == key)
            .map(|d| d.default.clone())
    }
}

fn parse_uri(text: Option<&str>) -> Option<Uri> {
    text.and_then(|t| Uri::parse(t).ok())
}

fn collect_stored(node: &StoredDockNode, out: &mut Vec<StoredWidget>) {
    match node {
        StoredDockNode::TabArea { widgets, .. } => out.extend(widgets.iter().cloned()),
        StoredDockNode::Split { children, .. } => {
            for child in children {
                collect_stored(child, out);
            }
        }
    }
}

/// Rebuild one stored node, consuming one resolved slot per stored widget
/// in the same order pass 1 collected them. Area ids are placeholders;
/// the dock panel reissues them on restore.
fn build_node(
    node: &StoredDockNode,
    cursor: &mut std::vec::IntoIter<Option<WidgetHandle>>,
) -> Option<DockNode> {
    match node {
        StoredDockNode::TabArea {
            widgets,
            current_index,
        } => {
            let mut kept = Vec::new();
            let mut kept_current = None;
            for (i, _) in widgets.iter().enumerate() {
                let slot = cursor.next().flatten();
                if let Some(widget) = slot {
                    if *current_index == Some(i) {
                        kept_current = Some(kept.len());
                    }
                    kept.push(widget);
                }
            }
            if kept.is_empty() {
                None
            } else {
                Some(DockNode::Tabs(TabArea {
                    id: TabAreaId(0),
                    widgets: kept,
                    current_index: kept_current,
                }))
            }
        }
        StoredDockNode::Split {
            orientation,
            sizes,
            children,
        } => {
            let mut built = Vec::new();
            let mut kept_sizes = Vec::new();
            for (i, child) in children.iter().enumerate() {
                if let Some(node) = build_node(child, cursor) {
                    built.push(node);
                    kept_sizes.push(sizes.get(i).copied().unwrap_or(0.0));
                }
            }
            match built.len() {
                0 => None,
                1 => built.pop(),
                _ => Some(DockNode::Split(SplitArea {
                    orientation: *orientation,
                    children: built,
                    sizes: kept_sizes,
                })),
            }
        }
    }
}

fn stored_widget_count(stored: &StoredShellLayout) -> usize {
    let mut out = Vec::new();
    if let Some(root) = &stored.main_panel.root {
        collect_stored(root, &mut out);
    }
    if let Some(root) = &stored.bottom_panel.layout.root {
        collect_stored(root, &mut out);
    }
    out.len() + stored.primary_sidebar.widgets.len()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
