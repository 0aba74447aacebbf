//! # WFA Hub Shared Library
//!
//! Domain types, persistence and business rules shared by the WFA Hub API
//! server and the bulk-campaign worker.
//!
//! ## Module Organization
//!
//! - `db`: connection pool and migrations
//! - `models`: database models and their queries
//! - `auth`: password hashing, session tokens, request authentication
//! - `schema`: template input-schema validation
//! - `mapping`: column-to-field mapping for uploaded spreadsheets
//! - `templating`: `{placeholder}` merge into HTML templates
//! - `dataset`: CSV parsing into tabular data
//! - `credits`: credit-metered execution ledger
//! - `mailer`: outbound SMTP delivery
//! - `pdf`: HTML to PDF rendering

pub mod auth;
pub mod credits;
pub mod dataset;
pub mod db;
pub mod mailer;
pub mod mapping;
pub mod models;
pub mod pdf;
pub mod schema;
pub mod templating;

/// Current version of the WFA Hub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
