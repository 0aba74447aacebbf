/// Database models
///
/// Each model is a plain struct deriving `sqlx::FromRow` with its queries as
/// associated async functions taking a `&PgPool` (or a connection when the
/// caller owns a transaction).
///
/// Enum-valued columns are stored as TEXT guarded by CHECK constraints; the
/// structs decode them with `#[sqlx(try_from = "String")]` and queries bind
/// `as_str()`.
///
/// # Models
///
/// - [`user`]: accounts, roles and credit balances
/// - [`template`]: automation templates and their input schema
/// - [`execution_log`]: one row per template run
/// - [`credit_transaction`]: append-only credit ledger
/// - [`smtp_config`]: per-user and system SMTP servers
/// - [`customer`]: per-user address book
/// - [`bulk_campaign`] / [`campaign_recipient`]: bulk email jobs
/// - [`user_preferences`], [`app_settings`], [`policy_page`]
/// - [`analytics`]: read-only aggregate queries

pub mod analytics;
pub mod app_settings;
pub mod bulk_campaign;
pub mod campaign_recipient;
pub mod credit_transaction;
pub mod customer;
pub mod execution_log;
pub mod policy_page;
pub mod smtp_config;
pub mod template;
pub mod user;
pub mod user_preferences;

use serde::Deserialize;

/// A stored string didn't match any known enum variant
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Page/per-page query parameters shared by list endpoints
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,

    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl Pagination {
    pub const MAX_PER_PAGE: i64 = 100;

    /// LIMIT value, clamped to 1..=100
    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, Self::MAX_PER_PAGE)
    }

    /// OFFSET value; pages start at 1 and huge pages saturate (empty result)
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let p = Pagination::default();
        assert_eq!(p.limit(), 20);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination { page: 3, per_page: 500 };
        assert_eq!(p.limit(), 100);
        assert_eq!(p.offset(), 200);

        let p = Pagination { page: 0, per_page: 0 };
        assert_eq!(p.limit(), 1);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_huge_page_saturates() {
        let p = Pagination { page: i64::MAX, per_page: 100 };
        assert_eq!(p.offset(), i64::MAX);

        let p = Pagination { page: i64::MIN, per_page: 100 };
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_from_query() {
        let p: Pagination = serde_json::from_str(r#"{"page": 2}"#).unwrap();
        assert_eq!(p.page, 2);
        assert_eq!(p.per_page, 20);
    }
}
