/// Integration tests for database migrations
///
/// These tests require a running PostgreSQL database.
/// Run with: cargo test --test db_migrations_tests -- --ignored --test-threads=1

mod common;

use wfahub_shared::db::migrations::{get_migration_status, run_migrations};
use wfahub_shared::db::pool::close_pool;

#[tokio::test]
#[ignore]
async fn test_migrations_are_idempotent() {
    let pool = common::setup().await;

    let status_1 = get_migration_status(&pool).await.expect("Failed to get status");
    run_migrations(&pool).await.expect("Second migration run failed");
    let status_2 = get_migration_status(&pool).await.expect("Failed to get status");

    assert!(status_1.applied_migrations > 0);
    assert_eq!(status_1.applied_migrations, status_2.applied_migrations);
    assert!(status_2.latest_version.is_some());

    close_pool(pool).await;
}

#[tokio::test]
#[ignore]
async fn test_migration_creates_all_tables() {
    let pool = common::setup().await;

    let expected_tables = vec![
        "users",
        "templates",
        "execution_logs",
        "credit_transactions",
        "smtp_configs",
        "customers",
        "bulk_campaigns",
        "campaign_recipients",
        "user_preferences",
        "app_settings",
        "policy_pages",
    ];

    for table_name in expected_tables {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = 'public'
                AND table_name = $1
            )",
        )
        .bind(table_name)
        .fetch_one(&pool)
        .await
        .unwrap_or_else(|_| panic!("Failed to check for table {}", table_name));

        assert!(exists, "Table '{}' should exist after migrations", table_name);
    }

    close_pool(pool).await;
}

#[tokio::test]
#[ignore]
async fn test_settings_are_seeded() {
    let pool = common::setup().await;

    let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM app_settings ORDER BY key")
        .fetch_all(&pool)
        .await
        .expect("Failed to read settings");

    assert!(keys.contains(&"pdf_generation".to_string()));
    assert!(keys.contains(&"menu_defaults".to_string()));

    close_pool(pool).await;
}

#[tokio::test]
#[ignore]
async fn test_credits_cannot_go_negative_at_the_database() {
    let pool = common::setup().await;
    let user = common::create_user(&pool, 1).await;

    let result = sqlx::query("UPDATE users SET credits = -1 WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await;

    assert!(result.is_err(), "CHECK (credits >= 0) should reject the update");

    close_pool(pool).await;
}

#[tokio::test]
#[ignore]
async fn test_email_uniqueness_ignores_case() {
    let pool = common::setup().await;
    let user = common::create_user(&pool, 0).await;

    let result = sqlx::query("INSERT INTO users (email, password_hash) VALUES ($1, 'x')")
        .bind(user.email.to_uppercase())
        .execute(&pool)
        .await;

    assert!(result.is_err(), "users_email_key should reject a case variant");

    close_pool(pool).await;
}
