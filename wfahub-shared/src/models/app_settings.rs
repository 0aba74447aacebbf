/// Admin-controlled application settings
///
/// Stored as key → JSON rows in `app_settings`. Each known key has a typed
/// view here; values that fail to parse fall back to their defaults so a
/// hand-edited row can't take the server down.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::collections::BTreeMap;
use tracing::warn;

pub const PDF_GENERATION_KEY: &str = "pdf_generation";
pub const MENU_DEFAULTS_KEY: &str = "menu_defaults";

/// How PDFs are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfMethod {
    /// Headless Chromium on the server
    #[default]
    Local,

    /// Third-party HTML-to-PDF API
    Api,
}

impl PdfMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfMethod::Local => "local",
            PdfMethod::Api => "api",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PdfGenerationSetting {
    #[serde(default)]
    pub method: PdfMethod,
}

/// Menu key → visible, as chosen by admins for every user
pub type MenuVisibility = BTreeMap<String, bool>;

/// Both settings as one document (the admin settings screen)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub pdf_generation: PdfGenerationSetting,

    #[serde(default)]
    pub menu_defaults: MenuVisibility,
}

impl AppSettings {
    pub async fn load(pool: &PgPool) -> Result<Self, sqlx::Error> {
        Ok(Self {
            pdf_generation: get_or_default(pool, PDF_GENERATION_KEY).await?,
            menu_defaults: get_or_default(pool, MENU_DEFAULTS_KEY).await?,
        })
    }

    /// Writes both keys in one transaction
    pub async fn save(&self, pool: &PgPool) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        for (key, value) in [
            (PDF_GENERATION_KEY, serde_json::to_value(self.pdf_generation)),
            (MENU_DEFAULTS_KEY, serde_json::to_value(&self.menu_defaults)),
        ] {
            let value = value.map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
            sqlx::query(
                r#"
                INSERT INTO app_settings (key, value, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    pub async fn pdf_method(pool: &PgPool) -> Result<PdfMethod, sqlx::Error> {
        let setting: PdfGenerationSetting = get_or_default(pool, PDF_GENERATION_KEY).await?;
        Ok(setting.method)
    }

    pub async fn menu_defaults(pool: &PgPool) -> Result<MenuVisibility, sqlx::Error> {
        get_or_default(pool, MENU_DEFAULTS_KEY).await
    }
}

async fn get_or_default<T>(pool: &PgPool, key: &str) -> Result<T, sqlx::Error>
where
    T: DeserializeOwned + Default,
{
    let row: Option<(JsonValue,)> = sqlx::query_as("SELECT value FROM app_settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(value,)| parse_or_default(key, value)).unwrap_or_default())
}

fn parse_or_default<T>(key: &str, value: JsonValue) -> T
where
    T: DeserializeOwned + Default,
{
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(key, error = %e, "Unreadable app setting, using default");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pdf_setting_parsing() {
        let setting: PdfGenerationSetting = parse_or_default("k", json!({"method": "api"}));
        assert_eq!(setting.method, PdfMethod::Api);

        let setting: PdfGenerationSetting = parse_or_default("k", json!({"method": "fax"}));
        assert_eq!(setting.method, PdfMethod::Local);

        let setting: PdfGenerationSetting = parse_or_default("k", json!({}));
        assert_eq!(setting.method, PdfMethod::Local);
    }

    #[test]
    fn test_menu_defaults_parsing() {
        let menu: MenuVisibility = parse_or_default("k", json!({"campaigns": false, "customers": true}));
        assert_eq!(menu.get("campaigns"), Some(&false));

        let menu: MenuVisibility = parse_or_default("k", json!(["not", "a", "map"]));
        assert!(menu.is_empty());
    }

    #[test]
    fn test_settings_document_defaults() {
        let settings: AppSettings = serde_json::from_value(json!({"menu_defaults": {"x": true}})).unwrap();
        assert_eq!(settings.pdf_generation.method, PdfMethod::Local);
        assert_eq!(settings.menu_defaults.len(), 1);
    }
}
