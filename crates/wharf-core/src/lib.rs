#![forbid(unsafe_code)]

//! Foundation types for the wharf workbench shell.
//!
//! Everything here is deliberately free of shell policy: URIs name
//! resources, emitters deliver typed events, surfaces hold rendered cells,
//! and storage backends persist string blobs. The `wharf-shell` crate
//! builds the docking shell on top of these.

pub mod event;
pub mod geometry;
pub mod storage;
pub mod surface;
pub mod uri;

// --- Common re-exports -----------------------------------------------------

pub use event::{DisposalBag, Emitter, Subscription};
pub use geometry::Rect;
pub use storage::{FileStorage, MemoryStorage, StorageBackend, StorageError, StorageResult};
pub use surface::Surface;
pub use uri::{Uri, UriError, UriParams};
