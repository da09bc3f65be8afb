#![forbid(unsafe_code)]

//! Wharf public facade crate.
//!
//! Re-exports the workbench shell and its foundation types behind one
//! dependency, plus a prelude for day-to-day usage. Applications depend on
//! this crate; the split into `wharf-core` and `wharf-shell` is an
//! implementation detail.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use wharf_core::{
    DisposalBag, Emitter, FileStorage, MemoryStorage, Rect, StorageBackend, StorageError,
    Subscription, Surface, Uri, UriError, UriParams,
};

// --- Shell re-exports ------------------------------------------------------

pub use wharf_shell::{
    AddWidgetOptions, ApplicationShell, Area, Command, CommandRegistry, DockAddMode,
    DockAddOptions, DockMode, DockPanel, DragService, DropZone, HoverService, Key, KeyCombo,
    KeybindingRegistry, LayoutRestorer, Modifiers, OpenOptions, Orientation, PreferenceDecl,
    PreferenceKind, RestoreError, RestoreSummary, ShellConfig, ShellError, SplitPane, SplitWidget,
    Stateful, Title, ViewManager, ViewRenderer, ViewService, WidgetBehavior, WidgetError,
    WidgetFactory, WidgetHandle, WidgetId, WidgetManager, WidgetOpenHandler, Workbench,
};

// --- Errors ----------------------------------------------------------------

/// Top-level error type for wharf applications.
#[derive(Debug)]
pub enum Error {
    /// A shell operation was misused or a widget failed to materialize.
    Shell(ShellError),
    /// Layout persistence failed.
    Restore(RestoreError),
    /// The storage backend failed.
    Storage(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(err) => write!(f, "{err}"),
            Self::Restore(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Shell(err) => Some(err),
            Self::Restore(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<ShellError> for Error {
    fn from(err: ShellError) -> Self {
        Self::Shell(err)
    }
}

impl From<RestoreError> for Error {
    fn from(err: RestoreError) -> Self {
        Self::Restore(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

/// Standard result type for wharf APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude ---------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Area, Error, KeyCombo, MemoryStorage, Rect, Result, ShellConfig, Stateful, Surface, Uri,
        WidgetBehavior, WidgetFactory, WidgetHandle, Workbench,
    };

    pub use crate::{core, shell};
}

pub use wharf_core as core;
pub use wharf_shell as shell;
