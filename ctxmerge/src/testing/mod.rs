//! Testing utilities for code that consumes contexts.
//!
//! This module provides:
//! - A hand-driven context with fixed deadline and values
//! - Assertions on cancellation state
//! - Tracing setup for tests

mod assertions;
mod fixtures;

pub use assertions::{assert_active, assert_canceled_with, assert_canceled_within};
pub use fixtures::{as_context_ref, init_test_tracing, StaticContext};
