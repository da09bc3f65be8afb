#![forbid(unsafe_code)]

//! Docking workbench shell.
//!
//! The shell arranges widgets in fixed regions (a tabbed, splittable main
//! panel, a bottom panel, sidebars and bars) and keeps the arrangement
//! alive across restarts. The pieces compose bottom-up:
//!
//! - [`WidgetManager`] resolves URIs to widgets through registered
//!   factories, with single-flight creation.
//! - [`ApplicationShell`] owns the regions and the current-widget pointer.
//! - [`LayoutRestorer`] serializes the whole arrangement to a storage
//!   backend and inflates it again.
//! - [`WidgetOpenHandler`] is the one entry point applications call to
//!   open a URI.
//! - [`ViewManager`] drives init, frame rendering and timers.
//! - [`Workbench`] wires all of that against one storage backend.
//!
//! Two workbenches never share state; registries are per instance.

pub mod area;
pub mod commands;
pub mod config;
pub mod dock;
pub mod error;
pub mod factory;
pub mod manager;
pub mod open_handler;
pub mod restorer;
pub mod services;
pub mod shell;
pub mod split_widget;
pub mod stateful;
pub(crate) mod sync;
pub mod view;
pub mod widget;
pub mod workbench;

// --- Common re-exports -----------------------------------------------------

pub use area::Area;
pub use commands::{
    Command, CommandError, CommandRegistry, Key, KeyCombo, KeyComboError, KeybindingRegistry,
    Modifiers,
};
pub use config::ShellConfig;
pub use dock::{
    DockAddMode, DockAddOptions, DockLayoutData, DockMode, DockNode, DockPanel, Orientation,
};
pub use error::{RestoreError, ShellError, WidgetError};
pub use factory::{ToolbarItem, UriMatch, WidgetFactory};
pub use manager::WidgetManager;
pub use open_handler::{OpenOptions, WidgetOpenHandler};
pub use restorer::{LayoutRestorer, PreferenceDecl, PreferenceKind, RestoreSummary};
pub use services::{
    DragPayload, DragService, DropEvent, DropZone, HoverRequest, HoverService, ViewService,
};
pub use shell::{AddWidgetOptions, ApplicationShell, LayoutData};
pub use split_widget::{SplitPane, SplitWidget};
pub use stateful::Stateful;
pub use view::{CapturedError, ViewManager, ViewRenderer};
pub use widget::{
    Title, WeakWidgetHandle, WidgetBehavior, WidgetEvents, WidgetFlags, WidgetHandle, WidgetId,
};
pub use workbench::Workbench;
