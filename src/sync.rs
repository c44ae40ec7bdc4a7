use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `m`, taking the data even if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
