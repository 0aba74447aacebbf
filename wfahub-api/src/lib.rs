//! # WFA Hub API Server Library
//!
//! This library provides the HTTP layer of WFA Hub: session authentication,
//! the template catalog and credit-metered executions, bulk campaigns and
//! the admin console.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and session middleware
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and auth rate limiting
//! - `notify`: Account emails through the system SMTP server
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod routes;
