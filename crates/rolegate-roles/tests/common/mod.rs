//! Common test utilities for rolegate-roles integration tests

pub mod mock_stores;

#[allow(unused_imports)]
pub use mock_stores::{principal, GatedStore, ToggleStore};
