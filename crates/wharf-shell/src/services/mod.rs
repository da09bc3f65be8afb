#![forbid(unsafe_code)]
//! Operational services layered on the shell: hover popups, tab drag and
//! drop, and tab/panel user operations.

pub mod drag;
pub mod hover;
pub mod view_service;

pub use drag::{
    zone_for_position, DragPayload, DragService, DropEvent, DropZone, WIDGET_DRAG_MIME,
};
pub use hover::{HoverRequest, HoverService};
pub use view_service::ViewService;
