#![forbid(unsafe_code)]
//! Shell configuration.
//!
//! Everything here is set once at construction. Runtime-mutable state
//! (split sizes, hidden panels) lives in the shell itself and is persisted
//! through the layout restorer instead.

use crate::dock::DockMode;

/// Construction-time options for the application shell.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Initial tabbing discipline of the main panel.
    pub dock_mode: DockMode,
    /// Whether the main panel accepts split placements at all.
    pub allow_split: bool,
    /// Appended to persisted storage keys so applications sharing one
    /// backend keep separate layouts.
    pub storage_suffix: String,
    /// Relative widths of primary sidebar, center, secondary sidebar.
    pub left_right_sizes: [f64; 3],
    /// Relative heights of main and bottom panel within the center column.
    pub main_bottom_sizes: [f64; 2],
    pub top_bar_height: u16,
    pub status_bar_height: u16,
    pub activity_bar_width: u16,
    pub right_bar_width: u16,
    /// Hover popups open after this many ticks over one target.
    pub hover_delay_ticks: u32,
}

impl Default for ShellConfig {
    fn default() -> Self {
        ShellConfig {
            dock_mode: DockMode::MultipleDocument,
            allow_split: true,
            storage_suffix: String::new(),
            left_right_sizes: [0.2, 0.6, 0.2],
            main_bottom_sizes: [0.7, 0.3],
            top_bar_height: 1,
            status_bar_height: 1,
            activity_bar_width: 3,
            right_bar_width: 3,
            hover_delay_ticks: 3,
        }
    }
}

impl ShellConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_dock_mode(mut self, mode: DockMode) -> Self {
        self.dock_mode = mode;
        self
    }

    #[must_use]
    pub fn with_allow_split(mut self, allow: bool) -> Self {
        self.allow_split = allow;
        self
    }

    #[must_use]
    pub fn with_storage_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.storage_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn with_hover_delay_ticks(mut self, ticks: u32) -> Self {
        self.hover_delay_ticks = ticks;
        self
    }
}
