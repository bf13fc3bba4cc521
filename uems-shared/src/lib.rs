//! # UEMS Shared Library
//!
//! This crate contains the configuration, data layer and business services
//! used by the UEMS bootstrap tool and the request layer.
//!
//! ## Module Organization
//!
//! - `config`: Environment-driven configuration resolution
//! - `db`: Connection pool, migration runner, migrations and seeding
//! - `models`: Database models and their queries
//! - `services`: Entity services (contacts, organizations, activities) and authentication
//! - `auth`: Password hashing and JWT primitives
//! - `validation`: Input validation returning typed field errors
//! - `error`: Common service error type

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod validation;

/// Current version of the UEMS shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
