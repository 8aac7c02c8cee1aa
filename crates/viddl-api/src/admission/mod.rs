//! Admission gates consulted before a job may start.
//!
//! # Design
//! - Both gates are owned tables behind a lock, shared with the HTTP layer by `Arc`.
//! - Lock scope covers map mutation only; nothing here touches the filesystem.
//! - A poisoned lock is recovered rather than propagated; the guarded maps hold
//!   plain counters that stay consistent across a panicking holder.

pub mod concurrency;
pub mod rate;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use concurrency::{ConcurrencyAdmission, ConcurrencyPermit};
pub use rate::{RateAdmission, RateDecision, RateSettings};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
