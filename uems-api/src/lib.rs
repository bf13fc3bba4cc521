//! # UEMS Request Layer Library
//!
//! The boundary HTTP handlers build on: application state wired from an
//! explicit configuration, the mapping from service failures to HTTP
//! responses, and the bearer-token extractor.
//!
//! ## Modules
//!
//! - `app`: Application state and service factory
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Authenticated-user extractor and role checks

pub mod app;
pub mod error;
pub mod extract;
