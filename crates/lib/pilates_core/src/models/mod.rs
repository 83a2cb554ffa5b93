//! Domain models.
//!
//! Row types are internal and are mapped to API response models in
//! `pilates_api`. The create/update inputs deserialize from camelCase JSON
//! and serve directly as request bodies.

pub mod auth;
pub mod domain;
