//! HTTP handlers

mod app;
mod auth;
mod health;

pub use app::{index, me, refresh_roles};
pub use auth::{callback, login, logout};
pub use health::{health, ready};
