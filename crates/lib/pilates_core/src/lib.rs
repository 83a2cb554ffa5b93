//! # pilates_core
//!
//! Core domain logic for the Pilates studio backend: owner credentials and
//! bearer tokens, the ownership-scoped store, report share links, photo
//! storage and homework reminders.

pub mod auth;
pub mod models;
pub mod photos;
pub mod reminders;
pub mod shares;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
