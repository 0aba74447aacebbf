/// Public policy pages (privacy, terms, refunds)
///
/// Admins upsert by slug; anyone can read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PolicyPage {
    pub slug: String,
    pub title: String,
    pub content_html: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyPageInput {
    pub title: String,
    pub content_html: String,
}

/// Slugs are lowercase ASCII letters, digits and dashes
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 100
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl PolicyPage {
    pub async fn find(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PolicyPage>(
            "SELECT slug, title, content_html, updated_at FROM policy_pages WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(pool)
        .await
    }

    pub async fn upsert(
        pool: &PgPool,
        slug: &str,
        data: PolicyPageInput,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PolicyPage>(
            r#"
            INSERT INTO policy_pages (slug, title, content_html, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (slug) DO UPDATE SET
                title = EXCLUDED.title,
                content_html = EXCLUDED.content_html,
                updated_at = NOW()
            RETURNING slug, title, content_html, updated_at
            "#,
        )
        .bind(slug)
        .bind(data.title.trim())
        .bind(data.content_html)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_rules() {
        assert!(is_valid_slug("privacy"));
        assert!(is_valid_slug("refund-policy-2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Privacy"));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug(&"a".repeat(101)));
    }
}
