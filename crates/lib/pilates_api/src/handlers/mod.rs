//! Request handlers.

pub mod auth;
pub mod clients;
pub mod health;
pub mod photos;
pub mod reports;
pub mod sessions;
pub mod shares;
