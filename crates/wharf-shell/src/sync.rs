#![forbid(unsafe_code)]
//! Lock helpers shared across the crate.

use std::sync::{Mutex, MutexGuard};

/// Acquire a mutex, recovering the inner value if a previous holder
/// panicked. Shell state mutations are small and never leave a guard alive
/// across a call that can panic, so a poisoned lock only ever means a widget
/// `render` panicked while holding its behavior lock. That panic is caught
/// by the view renderer's error boundary, and the widget must stay usable
/// afterwards.
pub(crate) fn lock<'a, T: ?Sized>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
