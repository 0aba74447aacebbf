/// Per-user UI preferences
///
/// Each user has at most one row; a missing row means "all defaults". Menu
/// visibility is stored as overrides only, and the effective map is the
/// admin defaults overlaid with those overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::app_settings::MenuVisibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Grid => "grid",
            ViewMode::List => "list",
        }
    }
}

impl From<String> for ViewMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "list" => ViewMode::List,
            _ => ViewMode::Grid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserPreferences {
    pub user_id: Uuid,

    #[sqlx(try_from = "String")]
    pub view_mode: ViewMode,

    /// User overrides only
    pub menu_visibility: Json<MenuVisibility>,

    pub updated_at: DateTime<Utc>,
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePreferences {
    #[serde(default)]
    pub view_mode: Option<ViewMode>,

    /// Replaces the stored overrides when present
    #[serde(default)]
    pub menu_visibility: Option<MenuVisibility>,
}

impl UserPreferences {
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            view_mode: ViewMode::default(),
            menu_visibility: Json(MenuVisibility::new()),
            updated_at: Utc::now(),
        }
    }

    /// Stored row, or defaults when the user never saved any
    pub async fn get(pool: &PgPool, user_id: Uuid) -> Result<Self, sqlx::Error> {
        let prefs = sqlx::query_as::<_, UserPreferences>(
            "SELECT user_id, view_mode, menu_visibility, updated_at \
             FROM user_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(prefs.unwrap_or_else(|| Self::defaults_for(user_id)))
    }

    pub async fn upsert(
        pool: &PgPool,
        user_id: Uuid,
        update: UpdatePreferences,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, UserPreferences>(
            r#"
            INSERT INTO user_preferences (user_id, view_mode, menu_visibility, updated_at)
            VALUES ($1, COALESCE($2, 'grid'), COALESCE($3, '{}'::JSONB), NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                view_mode = COALESCE($2, user_preferences.view_mode),
                menu_visibility = COALESCE($3, user_preferences.menu_visibility),
                updated_at = NOW()
            RETURNING user_id, view_mode, menu_visibility, updated_at
            "#,
        )
        .bind(user_id)
        .bind(update.view_mode.map(|m| m.as_str()))
        .bind(update.menu_visibility.map(Json))
        .fetch_one(pool)
        .await
    }

    /// Admin defaults overlaid with this user's overrides
    pub fn effective_menu(&self, defaults: &MenuVisibility) -> MenuVisibility {
        let mut effective = defaults.clone();
        for (key, visible) in self.menu_visibility.iter() {
            effective.insert(key.clone(), *visible);
        }
        effective
    }
}
