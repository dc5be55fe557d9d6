//! Test utilities for integration testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory implementations of every repository and sink port
//! - A builder for an `AppState` wired to those mocks

use std::sync::atomic::{AtomicUsize, Ordering};

mod app_state_builder;
mod factories;
mod notification_mocks;
mod user_mocks;

pub use app_state_builder::*;
pub use application_mocks::*;
pub use factories::*;
pub use notification_mocks::*;
pub use user_mocks::*;

/// Consumes one injected failure, if any are left.
pub(crate) fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
