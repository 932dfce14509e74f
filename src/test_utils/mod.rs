//! Test utilities.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - An in-memory store implementing every repository trait
//! - A recording notifier and a builder wiring all use cases to them

mod factories;
mod notifier_mocks;
mod services;
mod store_mocks;

pub use factories::*;
pub use notifier_mocks::*;
pub use services::*;
pub use store_mocks::*;
