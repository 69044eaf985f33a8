//! Repository layer — query functions organized by domain.

pub mod analytics;
pub mod campaigns;
pub mod contacts;
pub mod credentials;
pub mod credits;
pub mod import_jobs;
pub mod security;
pub mod services;
pub mod users;
