/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Sessions, registration, password and email flows
/// - `templates`: Template catalog for signed-in users
/// - `executions`: Template execution and execution history
/// - `credits`: Credit ledger
/// - `preferences`: Per-user view mode and menu visibility
/// - `customers`: Per-user address book
/// - `smtp`: User-owned SMTP configurations
/// - `campaigns`: Bulk email campaigns
/// - `analytics`: Per-user usage summary
/// - `policies`: Public policy pages
/// - `admin`: Admin console

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod campaigns;
pub mod credits;
pub mod customers;
pub mod executions;
pub mod health;
pub mod policies;
pub mod preferences;
pub mod smtp;
pub mod templates;

use serde::Serialize;
use wfahub_shared::models::Pagination;

/// One page of a list endpoint
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page.max(1),
            per_page: pagination.limit(),
        }
    }
}
