#![forbid(unsafe_code)]
//! Shell error types.
//!
//! Three families, matching the three failure surfaces:
//!
//! | Type           | Surface                                  | Typical handling        |
//! |----------------|------------------------------------------|-------------------------|
//! | `WidgetError`  | widget creation and initialization       | propagate to the caller |
//! | `ShellError`   | misuse of the shell API                  | propagate or log        |
//! | `RestoreError` | layout persistence round trips           | log, fall back          |
//!
//! `WidgetError` is `Clone` because a single creation failure fans out to
//! every caller waiting on the same shared in-flight future.

use crate::area::Area;
use std::error::Error;
use std::fmt;
use wharf_core::StorageError;

/// Failure while producing or initializing a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    /// No registered factory claims the URI.
    NoFactory(String),
    /// A factory matched but declares no creation strategy.
    NoStrategy(String),
    /// The factory's creation strategy or the widget's `init` failed.
    CreationFailed { uri: String, reason: String },
    /// The widget was disposed while the operation was in flight.
    Disposed(String),
}

impl fmt::Display for WidgetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidgetError::NoFactory(uri) => {
                write!(f, "no widget factory registered for {uri}")
            }
            WidgetError::NoStrategy(uri) => {
                write!(f, "widget factory for {uri} has no creation strategy")
            }
            WidgetError::CreationFailed { uri, reason } => {
                write!(f, "widget creation failed for {uri}: {reason}")
            }
            WidgetError::Disposed(id) => write!(f, "widget {id} is disposed"),
        }
    }
}

impl Error for WidgetError {}

/// Misuse of a shell operation.
#[derive(Debug)]
pub enum ShellError {
    /// Dock placement options were passed for a region that is not a dock
    /// panel.
    UnexpectedArea(Area),
    /// The operation only makes sense for a dock region.
    IllegalArea(Area),
    /// A widget without an id cannot be attached.
    MissingWidgetId,
    /// Widget creation failed while servicing the operation.
    Widget(WidgetError),
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::UnexpectedArea(area) => {
                write!(f, "unexpected area for dock placement options: {area}")
            }
            ShellError::IllegalArea(area) => {
                write!(f, "illegal argument: {area} is not a dock area")
            }
            ShellError::MissingWidgetId => f.write_str("widget has no id"),
            ShellError::Widget(err) => write!(f, "widget error: {err}"),
        }
    }
}

impl Error for ShellError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ShellError::Widget(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WidgetError> for ShellError {
    fn from(err: WidgetError) -> Self {
        ShellError::Widget(err)
    }
}

/// Failure while persisting or restoring layout state.
#[derive(Debug)]
pub enum RestoreError {
    /// The storage backend failed.
    Storage(StorageError),
    /// The persisted blob could not be encoded or decoded.
    Serialization(String),
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreError::Storage(err) => write!(f, "layout storage error: {err}"),
            RestoreError::Serialization(msg) => {
                write!(f, "layout serialization error: {msg}")
            }
        }
    }
}

impl Error for RestoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RestoreError::Storage(err) => Some(err),
            RestoreError::Serialization(_) => None,
        }
    }
}

impl From<StorageError> for RestoreError {
    fn from(err: StorageError) -> Self {
        RestoreError::Storage(err)
    }
}

impl From<serde_json::Error> for RestoreError {
    fn from(err: serde_json::Error) -> Self {
        RestoreError::Serialization(err.to_string())
    }
}
