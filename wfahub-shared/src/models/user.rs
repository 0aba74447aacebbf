/// User model and database operations
///
/// Users own a credit balance that template executions draw down. The balance
/// is only ever changed through guarded single-row updates (see
/// [`crate::credits`]), and the table carries `CHECK (credits >= 0)` as a
/// backstop.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(320) NOT NULL,            -- unique on LOWER(email)
///     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255),
///     company VARCHAR(255),
///     phone VARCHAR(64),
///     avatar_url VARCHAR(512),
///     role VARCHAR(16) NOT NULL DEFAULT 'user',
///     credits INTEGER NOT NULL DEFAULT 0 CHECK (credits >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use wfahub_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let mut conn = pool.acquire().await?;
/// let user = User::create(
///     &mut conn,
///     CreateUser {
///         email: "Owner@Example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         name: Some("Ana".to_string()),
///         company: None,
///         credits: 10,
///     },
/// )
/// .await?;
///
/// assert_eq!(user.email, "owner@example.com");
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::UnknownVariant;

const USER_COLUMNS: &str = "id, email, email_verified, password_hash, name, company, phone, \
     avatar_url, role, credits, created_at, updated_at, last_login_at";

/// Access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(UnknownVariant::new("role", value)),
        }
    }
}

/// User account
///
/// The password hash is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Stored lowercased
    pub email: String,

    pub email_verified: bool,

    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub name: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,

    #[sqlx(try_from = "String")]
    pub role: UserRole,

    /// Current credit balance, never negative
    pub credits: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,

    /// Argon2id hash, never the plaintext password
    pub password_hash: String,

    pub name: Option<String>,
    pub company: Option<String>,

    /// Opening balance (the signup bonus)
    pub credits: i32,
}

/// Profile fields a user may edit
///
/// `None` leaves a column untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfile {
    #[serde(default, with = "double_option")]
    pub name: Option<Option<String>>,

    #[serde(default, with = "double_option")]
    pub company: Option<Option<String>>,

    #[serde(default, with = "double_option")]
    pub phone: Option<Option<String>>,

    #[serde(default, with = "double_option")]
    pub avatar_url: Option<Option<String>>,
}

/// Distinguishes an absent JSON key from an explicit `null`
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Lowercases and trims an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Inserts a user
    ///
    /// Takes a connection so registration can write the signup ledger row in
    /// the same transaction.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` when the email is taken.
    pub async fn create(conn: &mut PgConnection, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, password_hash, name, company, credits) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.name)
            .bind(data.company)
            .bind(data.credits.max(0))
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive lookup
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE LOWER(email) = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Applies profile edits and returns the updated row
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut values: Vec<Option<String>> = Vec::new();

        for (column, value) in [
            ("name", data.name),
            ("company", data.company),
            ("phone", data.phone),
            ("avatar_url", data.avatar_url),
        ] {
            if let Some(value) = value {
                values.push(value);
                query.push_str(&format!(", {} = ${}", column, values.len() + 1));
            }
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {}", USER_COLUMNS));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);
        for value in values {
            q = q.bind(value);
        }

        q.fetch_optional(pool).await
    }

    pub async fn set_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_email_verified(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_role(
        pool: &PgPool,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Permanently deletes the account and, by cascade, everything it owns
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users newest first, optionally filtered by an email substring
    pub async fn list(
        pool: &PgPool,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM users \
             WHERE ($1::TEXT IS NULL OR LOWER(email) LIKE '%' || LOWER($1) || '%') \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(search.map(escape_like))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &PgPool, search: Option<&str>) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users \
             WHERE ($1::TEXT IS NULL OR LOWER(email) LIKE '%' || LOWER($1) || '%')",
        )
        .bind(search.map(escape_like))
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}

/// Escapes LIKE wildcards in user-supplied search text
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
