/// SMTP server configurations
///
/// Rows with a `user_id` belong to that user. Rows with `user_id IS NULL` are
/// system configurations managed by admins; at most one of those carries
/// `is_system_default`, which is what sends mail for users who haven't set up
/// their own server and for account emails (verification, password reset).
///
/// The single-default rule is enforced twice: [`SmtpConfig::set_system_default`]
/// swaps the flag inside one transaction, and the partial unique index
/// `idx_smtp_configs_single_default` rejects any second holder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

const SMTP_COLUMNS: &str = "id, user_id, name, host, port, username, password, from_email, \
     from_name, use_tls, is_system_default, created_at, updated_at";

/// SMTP configuration
///
/// The password is never serialized into responses.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SmtpConfig {
    pub id: Uuid,

    /// None for system configurations
    pub user_id: Option<Uuid>,

    pub name: String,
    pub host: String,
    pub port: i32,
    pub username: String,

    #[serde(skip_serializing, default)]
    pub password: String,

    pub from_email: String,
    pub from_name: Option<String>,

    /// STARTTLS when true, plaintext otherwise
    pub use_tls: bool,

    pub is_system_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update input
///
/// On update an empty or missing `password` keeps the stored one.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfigInput {
    pub name: String,
    pub host: String,
    pub port: i32,
    pub username: String,

    #[serde(default)]
    pub password: Option<String>,

    pub from_email: String,

    #[serde(default)]
    pub from_name: Option<String>,

    #[serde(default = "default_use_tls")]
    pub use_tls: bool,
}

fn default_use_tls() -> bool {
    true
}

impl SmtpConfigInput {
    /// Structural checks; returns `(field, message)` pairs
    pub fn problems(&self, creating: bool) -> Vec<(String, String)> {
        let mut problems = Vec::new();

        for (field, value) in [
            ("name", &self.name),
            ("host", &self.host),
            ("username", &self.username),
        ] {
            if value.trim().is_empty() {
                problems.push((field.to_string(), format!("{} is required", field)));
            }
        }

        if !(1..=65535).contains(&self.port) {
            problems.push(("port".to_string(), "Port must be between 1 and 65535".to_string()));
        }

        if !crate::schema::is_valid_email(&self.from_email) {
            problems.push(("from_email".to_string(), "Invalid email address".to_string()));
        }

        if creating && self.password.as_deref().map_or(true, str::is_empty) {
            problems.push(("password".to_string(), "password is required".to_string()));
        }

        problems
    }
}

impl SmtpConfig {
    /// Creates a configuration; `owner = None` makes it a system configuration
    pub async fn create(
        pool: &PgPool,
        owner: Option<Uuid>,
        data: SmtpConfigInput,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO smtp_configs \
             (user_id, name, host, port, username, password, from_email, from_name, use_tls) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            SMTP_COLUMNS
        );

        sqlx::query_as::<_, SmtpConfig>(&query)
            .bind(owner)
            .bind(data.name.trim())
            .bind(data.host.trim())
            .bind(data.port)
            .bind(data.username)
            .bind(data.password.unwrap_or_default())
            .bind(data.from_email.trim())
            .bind(data.from_name)
            .bind(data.use_tls)
            .fetch_one(pool)
            .await
    }

    /// Updates a configuration owned by `owner` (None = system)
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        owner: Option<Uuid>,
        data: SmtpConfigInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE smtp_configs SET name = $3, host = $4, port = $5, username = $6, \
             password = COALESCE(NULLIF($7, ''), password), from_email = $8, from_name = $9, \
             use_tls = $10, updated_at = NOW() \
             WHERE id = $1 AND user_id IS NOT DISTINCT FROM $2 RETURNING {}",
            SMTP_COLUMNS
        );

        sqlx::query_as::<_, SmtpConfig>(&query)
            .bind(id)
            .bind(owner)
            .bind(data.name.trim())
            .bind(data.host.trim())
            .bind(data.port)
            .bind(data.username)
            .bind(data.password)
            .bind(data.from_email.trim())
            .bind(data.from_name)
            .bind(data.use_tls)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM smtp_configs WHERE id = $1", SMTP_COLUMNS);

        sqlx::query_as::<_, SmtpConfig>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Configurations owned by `owner` (None = system configurations)
    pub async fn list(pool: &PgPool, owner: Option<Uuid>) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM smtp_configs WHERE user_id IS NOT DISTINCT FROM $1 \
             ORDER BY is_system_default DESC, created_at DESC",
            SMTP_COLUMNS
        );

        sqlx::query_as::<_, SmtpConfig>(&query)
            .bind(owner)
            .fetch_all(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid, owner: Option<Uuid>) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM smtp_configs WHERE id = $1 AND user_id IS NOT DISTINCT FROM $2")
                .bind(id)
                .bind(owner)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_system_default(pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM smtp_configs WHERE is_system_default LIMIT 1",
            SMTP_COLUMNS
        );

        sqlx::query_as::<_, SmtpConfig>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Makes a system configuration the single system default
    ///
    /// Clears the previous holder and sets the new one in one transaction.
    /// Returns None when `id` isn't a system configuration.
    pub async fn set_system_default(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE smtp_configs SET is_system_default = FALSE, updated_at = NOW() \
             WHERE is_system_default AND id <> $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "UPDATE smtp_configs SET is_system_default = TRUE, updated_at = NOW() \
             WHERE id = $1 AND user_id IS NULL RETURNING {}",
            SMTP_COLUMNS
        );

        let updated = sqlx::query_as::<_, SmtpConfig>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        match updated {
            Some(config) => {
                tx.commit().await?;
                info!(smtp_config_id = %id, "System default SMTP configuration changed");
                Ok(Some(config))
            }
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }

    /// Picks the server to send through for a user
    ///
    /// An explicitly requested configuration must belong to the user or be a
    /// system one. Without a request, the user's newest own configuration wins,
    /// then the system default.
    pub async fn resolve_for_user(
        pool: &PgPool,
        user_id: Uuid,
        requested: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        if let Some(id) = requested {
            let query = format!(
                "SELECT {} FROM smtp_configs WHERE id = $1 AND (user_id = $2 OR user_id IS NULL)",
                SMTP_COLUMNS
            );
            return sqlx::query_as::<_, SmtpConfig>(&query)
                .bind(id)
                .bind(user_id)
                .fetch_optional(pool)
                .await;
        }

        let query = format!(
            "SELECT {} FROM smtp_configs WHERE user_id = $1 OR is_system_default \
             ORDER BY (user_id IS NOT NULL) DESC, created_at DESC LIMIT 1",
            SMTP_COLUMNS
        );

        sqlx::query_as::<_, SmtpConfig>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> SmtpConfigInput {
        SmtpConfigInput {
            name: "Office".to_string(),
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: Some("pw".to_string()),
            from_email: "sales@example.com".to_string(),
            from_name: Some("Sales".to_string()),
            use_tls: true,
        }
    }

    #[test]
    fn test_valid_input_has_no_problems() {
        assert!(input().problems(true).is_empty());
    }

    #[test]
    fn test_input_problems() {
        let mut bad = input();
        bad.port = 0;
        bad.from_email = "not-an-email".to_string();
        bad.password = None;

        let fields: Vec<String> = bad.problems(true).into_iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["port", "from_email", "password"]);

        // Keeping the stored password is fine on update
        let fields: Vec<String> = bad.problems(false).into_iter().map(|(f, _)| f).collect();
        assert!(!fields.contains(&"password".to_string()));
    }

    #[test]
    fn test_password_not_serialized() {
        let config = SmtpConfig {
            id: Uuid::new_v4(),
            user_id: None,
            name: "System".to_string(),
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "u".to_string(),
            password: "hunter2".to_string(),
            from_email: "noreply@example.com".to_string(),
            from_name: None,
            use_tls: true,
            is_system_default: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("\"password\""));
    }

    #[test]
    fn test_use_tls_defaults_on() {
        let input: SmtpConfigInput = serde_json::from_str(
            r#"{"name":"n","host":"h","port":25,"username":"u","from_email":"a@b.co"}"#,
        )
        .unwrap();
        assert!(input.use_tls);
        assert!(input.password.is_none());
    }
}
