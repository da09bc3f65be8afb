#![forbid(unsafe_code)]
//! Tab and panel level user operations.
//!
//! Everything here is a thin policy layer over the shell: cycling tabs in
//! the active tab bar, closing tabs in bulk, reopening the most recently
//! closed one, toggling the bottom panel and full-screen mode. Operations
//! that touch many widgets keep going when one of them misbehaves.

use crate::area::Area;
use crate::dock::DockPanel;
use crate::open_handler::{OpenOptions, WidgetOpenHandler};
use crate::shell::ApplicationShell;
use crate::sync::lock;
use crate::widget::WidgetHandle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

struct FullScreenSnapshot {
    hidden: HashMap<Area, bool>,
    left_right_sizes: Vec<f64>,
    main_bottom_sizes: Vec<f64>,
}

struct ViewServiceInner {
    shell: ApplicationShell,
    open_handler: WidgetOpenHandler,
    full_screen: Mutex<Option<FullScreenSnapshot>>,
}

/// Tab navigation and bulk close operations. Cheap to clone.
#[derive(Clone)]
pub struct ViewService {
    inner: Arc<ViewServiceInner>,
}

impl ViewService {
    #[must_use]
    pub fn new(shell: ApplicationShell, open_handler: WidgetOpenHandler) -> Self {
        ViewService {
            inner: Arc::new(ViewServiceInner {
                shell,
                open_handler,
                full_screen: Mutex::new(None),
            }),
        }
    }

    /// The dock panel holding the current widget, defaulting to main.
    fn active_dock(&self) -> DockPanel {
        match self
            .inner
            .shell
            .current_widget()
            .and_then(|w| w.parent_area())
        {
            Some(Area::Bottom) => self.inner.shell.bottom_dock().clone(),
            _ => self.inner.shell.main_dock().clone(),
        }
    }

    // --- Tab cycling ---

    /// Activate the next tab in the active tab bar, wrapping around.
    pub fn open_next_tab(&self) {
        self.cycle_tab(1);
    }

    /// Activate the previous tab in the active tab bar, wrapping around.
    pub fn open_previous_tab(&self) {
        self.cycle_tab(-1);
    }

    fn cycle_tab(&self, step: isize) {
        let dock = self.active_dock();
        let bars = dock.tab_bars();
        let Some(bar) = bars.iter().find(|b| b.active).or_else(|| bars.first()) else {
            return;
        };
        if bar.titles.is_empty() {
            return;
        }
        let len = bar.titles.len() as isize;
        let current = bar.current.map_or(0, |c| c as isize);
        let next = (current + step).rem_euclid(len) as usize;
        let (id, _) = &bar.titles[next];
        dock.activate_widget(id);
    }

    // --- Closing ---

    /// Close the current tab of the active dock panel.
    pub fn close_current_tab(&self) {
        if let Some(widget) = self.active_dock().current_widget() {
            widget.dispose();
        }
    }

    /// Close every tab in both dock panels.
    pub fn close_all_tabs(&self) {
        for widget in self
            .inner
            .shell
            .main_dock()
            .widgets()
            .into_iter()
            .chain(self.inner.shell.bottom_dock().widgets())
        {
            widget.dispose();
        }
    }

    /// Close every tab of the active dock panel except the current one.
    pub fn close_other_tabs(&self) {
        let dock = self.active_dock();
        let keep = dock.current_widget();
        for widget in dock.widgets() {
            if keep.as_ref() == Some(&widget) {
                continue;
            }
            widget.dispose();
        }
    }

    /// Reopen the most recently closed widget. Failures are logged and the
    /// URI is dropped, so a dead factory cannot wedge the stack.
    pub async fn reopen_last_tab(&self) -> Option<WidgetHandle> {
        let uri = self.inner.shell.pop_last_closed()?;
        match self
            .inner
            .open_handler
            .open(&uri, OpenOptions::default())
            .await
        {
            Ok(widget) => Some(widget),
            Err(err) => {
                warn!(uri = %uri, error = %err, "could not reopen closed widget");
                None
            }
        }
    }

    // --- Panels ---

    /// Show the bottom panel if hidden, hide it otherwise.
    pub fn toggle_bottom_panel(&self) {
        if self.inner.shell.is_area_hidden(Area::Bottom) {
            self.inner.shell.expand_bottom_if_collapsed();
        } else {
            self.inner.shell.set_area_hidden(Area::Bottom, true);
        }
    }

    #[must_use]
    pub fn is_full_screen(&self) -> bool {
        lock(&self.inner.full_screen).is_some()
    }

    /// Hide everything but the main panel; a second call restores the
    /// regions exactly as they were.
    pub fn toggle_full_screen(&self) {
        let restore = lock(&self.inner.full_screen).take();
        match restore {
            Some(snapshot) => {
                for (area, hidden) in snapshot.hidden {
                    self.inner.shell.set_area_hidden(area, hidden);
                }
                self.inner
                    .shell
                    .set_left_right_sizes(snapshot.left_right_sizes);
                self.inner
                    .shell
                    .set_main_bottom_sizes(snapshot.main_bottom_sizes);
                debug!("full screen off");
            }
            None => {
                let mut hidden = HashMap::new();
                for area in Area::ALL {
                    if area == Area::Main {
                        continue;
                    }
                    hidden.insert(area, self.inner.shell.is_area_hidden(area));
                }
                let snapshot = FullScreenSnapshot {
                    hidden,
                    left_right_sizes: self.inner.shell.left_right_sizes(),
                    main_bottom_sizes: self.inner.shell.main_bottom_sizes(),
                };
                for area in Area::ALL {
                    if area != Area::Main {
                        self.inner.shell.set_area_hidden(area, true);
                    }
                }
                *lock(&self.inner.full_screen) = Some(snapshot);
                debug!("full screen on");
            }
        }
    }
}
