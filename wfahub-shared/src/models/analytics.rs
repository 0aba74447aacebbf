/// Read-only aggregate queries for the dashboards

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Dashboard numbers for one user
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub credits: i32,
    pub executions_total: i64,
    pub executions_success: i64,
    pub executions_failed: i64,
    pub credits_spent: i64,
    pub campaigns_total: i64,
    pub emails_sent: i64,
    pub emails_failed: i64,
}

/// Per-template usage for the admin dashboard
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TemplateUsage {
    pub template_id: Uuid,
    pub name: String,
    pub executions: i64,
    pub credits_consumed: i64,
}

/// System-wide numbers
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct AdminSummary {
    pub users_total: i64,
    pub users_last_30_days: i64,
    pub executions_total: i64,
    pub executions_failed: i64,
    pub credits_consumed: i64,
    pub credits_outstanding: i64,
    pub campaigns_total: i64,
    pub emails_sent: i64,

    #[sqlx(skip)]
    pub top_templates: Vec<TemplateUsage>,
}

pub async fn user_summary(pool: &PgPool, user_id: Uuid) -> Result<UserSummary, sqlx::Error> {
    let summary = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT
            u.credits,
            (SELECT COUNT(*) FROM execution_logs WHERE user_id = u.id) AS executions_total,
            (SELECT COUNT(*) FROM execution_logs WHERE user_id = u.id AND status = 'success') AS executions_success,
            (SELECT COUNT(*) FROM execution_logs WHERE user_id = u.id AND status = 'failed') AS executions_failed,
            (SELECT COALESCE(SUM(credits_charged - credits_refunded), 0)::BIGINT
                FROM execution_logs WHERE user_id = u.id) AS credits_spent,
            (SELECT COUNT(*) FROM bulk_campaigns WHERE user_id = u.id) AS campaigns_total,
            (SELECT COALESCE(SUM(sent_count), 0)::BIGINT FROM bulk_campaigns WHERE user_id = u.id) AS emails_sent,
            (SELECT COALESCE(SUM(failed_count), 0)::BIGINT FROM bulk_campaigns WHERE user_id = u.id) AS emails_failed
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(summary.unwrap_or_default())
}

pub async fn admin_summary(pool: &PgPool, top: i64) -> Result<AdminSummary, sqlx::Error> {
    let mut summary = sqlx::query_as::<_, AdminSummary>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS users_total,
            (SELECT COUNT(*) FROM users WHERE created_at > NOW() - INTERVAL '30 days') AS users_last_30_days,
            (SELECT COUNT(*) FROM execution_logs) AS executions_total,
            (SELECT COUNT(*) FROM execution_logs WHERE status = 'failed') AS executions_failed,
            (SELECT COALESCE(SUM(credits_charged - credits_refunded), 0)::BIGINT FROM execution_logs) AS credits_consumed,
            (SELECT COALESCE(SUM(credits), 0)::BIGINT FROM users) AS credits_outstanding,
            (SELECT COUNT(*) FROM bulk_campaigns) AS campaigns_total,
            (SELECT COALESCE(SUM(sent_count), 0)::BIGINT FROM bulk_campaigns) AS emails_sent
        "#,
    )
    .fetch_one(pool)
    .await?;

    summary.top_templates = sqlx::query_as::<_, TemplateUsage>(
        r#"
        SELECT t.id AS template_id, t.name,
               COUNT(l.id) AS executions,
               COALESCE(SUM(l.credits_charged - l.credits_refunded), 0)::BIGINT AS credits_consumed
        FROM templates t
        JOIN execution_logs l ON l.template_id = t.id
        GROUP BY t.id, t.name
        ORDER BY executions DESC, t.name
        LIMIT $1
        "#,
    )
    .bind(top)
    .fetch_all(pool)
    .await?;

    Ok(summary)
}
