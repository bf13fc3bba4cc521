//! # UEMS Bootstrap Library
//!
//! One-shot database bootstrap: applies schema migrations and creates the
//! baseline accounts.
//!
//! ## Modules
//!
//! - `bootstrap`: The connected bootstrap sequence and layout verification
//! - `credentials`: Administrator password policy
//! - `cli`: Command-line interface
//! - `error`: Bootstrap error type

pub mod bootstrap;
pub mod cli;
pub mod credentials;
pub mod error;

pub use bootstrap::{Bootstrap, InitReport, LayoutReport};
pub use error::BootstrapError;
