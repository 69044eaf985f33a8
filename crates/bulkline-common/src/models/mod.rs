//! Core domain models shared across all Bulkline services.
//!
//! These are the "truth" types — what the database stores and the API serializes.
//! Every owned row carries a `user_id`, and ids are UUID v7.

pub mod analytics;
pub mod campaign;
pub mod contact;
pub mod credential;
pub mod credit;
pub mod import_job;
pub mod security;
pub mod service;
pub mod user;

/// Re-export all model types for convenience.
pub use analytics::*;
pub use campaign::*;
pub use contact::*;
pub use credential::*;
pub use credit::*;
pub use import_job::*;
pub use security::*;
pub use service::*;
pub use user::*;
