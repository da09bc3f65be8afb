#![forbid(unsafe_code)]
//! Frame orchestration and widget rendering.

pub mod manager;
pub mod renderer;

pub use manager::ViewManager;
pub use renderer::{CapturedError, FallbackRender, ViewRenderer};
