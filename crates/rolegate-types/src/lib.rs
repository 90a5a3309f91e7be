//! Rolegate Types - Shared domain types
//!
//! This crate contains domain types used across rolegate crates:
//! - Authenticated principals
//! - Role sets and the roles the content gate recognizes

pub mod principal;
pub mod role;

pub use principal::*;
pub use role::*;
