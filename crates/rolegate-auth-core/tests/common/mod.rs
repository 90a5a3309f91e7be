//! Common test utilities for rolegate-auth-core integration tests

pub mod jwks_mock;

#[allow(unused_imports)]
pub use jwks_mock::{MockAuthority, TestIdTokenClaims, TestKeyPair, TEST_CLIENT_ID, TEST_TENANT_ID};
