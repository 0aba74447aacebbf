/// Automation templates
///
/// A template pairs a form definition (`input_schema`, an ordered list of
/// [`FieldDescriptor`]s) with a credit cost and an [`TemplateAction`] that
/// runs when a user submits the form.
///
/// Both JSON columns are read leniently: unknown keys are ignored, missing
/// keys fall back to defaults, and unknown field types survive as
/// [`FieldType::Other`] so older servers can read schemas written by newer
/// admin tooling.
///
/// # Example
///
/// ```
/// use wfahub_shared::models::template::{FieldDescriptor, FieldType};
///
/// let fields: Vec<FieldDescriptor> = serde_json::from_str(
///     r#"[{"name": "client_email", "label": "Client email", "type": "email", "required": true},
///         {"name": "rating", "type": "stars"}]"#,
/// )
/// .unwrap();
///
/// assert_eq!(fields[0].field_type, FieldType::Email);
/// assert_eq!(fields[1].field_type, FieldType::Other("stars".to_string()));
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

const TEMPLATE_COLUMNS: &str = "id, name, description, category, icon, input_schema, credit_cost, \
     action, is_active, created_by, created_at, updated_at";

/// Input widget kind
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Email,
    Number,
    Date,
    Url,
    Phone,
    Select,
    /// Any type this server doesn't know, kept verbatim
    Other(String),
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => FieldType::Text,
            "textarea" => FieldType::Textarea,
            "email" => FieldType::Email,
            "number" => FieldType::Number,
            "date" => FieldType::Date,
            "url" => FieldType::Url,
            "phone" | "tel" => FieldType::Phone,
            "select" => FieldType::Select,
            _ => FieldType::Other(value),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        match value {
            FieldType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Email => "email",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Url => "url",
            FieldType::Phone => "phone",
            FieldType::Select => "select",
            FieldType::Other(raw) => raw,
        }
    }
}

/// One form field in a template's input schema
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,

    #[serde(default)]
    pub label: String,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Allowed values for `select` fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    /// Lower bound for `number` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Upper bound for `number` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl FieldDescriptor {
    /// Label shown to users, falling back to the field name
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// What happens when a template is executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TemplateAction {
    /// Only log the execution
    #[default]
    RecordOnly,

    /// Merge the inputs into an email and send it
    SendEmail {
        subject: String,
        html_body: String,
        /// Input field holding the recipient address
        to_field: String,
    },
}

/// Automation template
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub input_schema: Json<Vec<FieldDescriptor>>,

    /// Credits deducted per execution
    pub credit_cost: i32,

    pub action: Json<TemplateAction>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin input for creating or replacing a template
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateInput {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub input_schema: Vec<FieldDescriptor>,

    #[serde(default)]
    pub credit_cost: i32,

    #[serde(default)]
    pub action: TemplateAction,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TemplateInput {
    /// Structural checks that don't need the database
    ///
    /// Returns `(field, message)` pairs.
    pub fn problems(&self) -> Vec<(String, String)> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push(("name".to_string(), "Name is required".to_string()));
        }
        if self.credit_cost < 0 {
            problems.push((
                "credit_cost".to_string(),
                "Credit cost cannot be negative".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.input_schema {
            if field.name.trim().is_empty() {
                problems.push((
                    "input_schema".to_string(),
                    "Every field needs a name".to_string(),
                ));
            } else if !seen.insert(field.name.as_str()) {
                problems.push((
                    "input_schema".to_string(),
                    format!("Field '{}' is defined more than once", field.name),
                ));
            }
        }

        if let TemplateAction::SendEmail { to_field, subject, .. } = &self.action {
            if subject.trim().is_empty() {
                problems.push(("action.subject".to_string(), "Subject is required".to_string()));
            }
            if !self.input_schema.iter().any(|f| &f.name == to_field) {
                problems.push((
                    "action.to_field".to_string(),
                    format!("'{}' is not a field of this template", to_field),
                ));
            }
        }

        problems
    }
}

impl Template {
    pub async fn create(
        pool: &PgPool,
        data: TemplateInput,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO templates \
             (name, description, category, icon, input_schema, credit_cost, action, is_active, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            TEMPLATE_COLUMNS
        );

        sqlx::query_as::<_, Template>(&query)
            .bind(data.name.trim())
            .bind(data.description)
            .bind(data.category)
            .bind(data.icon)
            .bind(Json(data.input_schema))
            .bind(data.credit_cost)
            .bind(Json(data.action))
            .bind(data.is_active)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: TemplateInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE templates SET name = $2, description = $3, category = $4, icon = $5, \
             input_schema = $6, credit_cost = $7, action = $8, is_active = $9, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            TEMPLATE_COLUMNS
        );

        sqlx::query_as::<_, Template>(&query)
            .bind(id)
            .bind(data.name.trim())
            .bind(data.description)
            .bind(data.category)
            .bind(data.icon)
            .bind(Json(data.input_schema))
            .bind(data.credit_cost)
            .bind(Json(data.action))
            .bind(data.is_active)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM templates WHERE id = $1", TEMPLATE_COLUMNS);

        sqlx::query_as::<_, Template>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Active templates, optionally narrowed to one category
    pub async fn list_active(
        pool: &PgPool,
        category: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM templates \
             WHERE is_active AND ($1::TEXT IS NULL OR category = $1) \
             ORDER BY category NULLS LAST, name",
            TEMPLATE_COLUMNS
        );

        sqlx::query_as::<_, Template>(&query)
            .bind(category)
            .fetch_all(pool)
            .await
    }

    /// Every template including inactive ones (admin view)
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM templates ORDER BY created_at DESC",
            TEMPLATE_COLUMNS
        );

        sqlx::query_as::<_, Template>(&query).fetch_all(pool).await
    }

    /// Deletes a template; its execution logs keep a NULL template_id
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_type_known_and_unknown() {
        assert_eq!(FieldType::from("email".to_string()), FieldType::Email);
        assert_eq!(FieldType::from("tel".to_string()), FieldType::Phone);
        assert_eq!(
            FieldType::from("signature".to_string()),
            FieldType::Other("signature".to_string())
        );

        let raw = serde_json::to_value(FieldType::Other("signature".to_string())).unwrap();
        assert_eq!(raw, json!("signature"));
    }

    #[test]
    fn test_field_descriptor_defaults_and_unknown_keys() {
        let field: FieldDescriptor = serde_json::from_value(json!({
            "name": "amount",
            "type": "number",
            "min": 0,
            "widget_hint": "slider"
        }))
        .unwrap();

        assert_eq!(field.field_type, FieldType::Number);
        assert_eq!(field.min, Some(0.0));
        assert!(!field.required);
        assert!(field.options.is_empty());
        assert_eq!(field.display_label(), "amount");
    }

    #[test]
    fn test_missing_type_defaults_to_text() {
        let field: FieldDescriptor = serde_json::from_value(json!({"name": "notes"})).unwrap();
        assert_eq!(field.field_type, FieldType::Text);
    }

    #[test]
    fn test_action_tagging() {
        let action: TemplateAction = serde_json::from_value(json!({"type": "record_only"})).unwrap();
        assert_eq!(action, TemplateAction::RecordOnly);

        let action: TemplateAction = serde_json::from_value(json!({
            "type": "send_email",
            "subject": "Quote {number}",
            "html_body": "<p>Hi {name}</p>",
            "to_field": "email"
        }))
        .unwrap();
        assert!(matches!(action, TemplateAction::SendEmail { ref to_field, .. } if to_field == "email"));
    }

    fn input(action: TemplateAction) -> TemplateInput {
        TemplateInput {
            name: "Quotation".to_string(),
            description: None,
            category: Some("sales".to_string()),
            icon: None,
            input_schema: vec![
                FieldDescriptor {
                    name: "email".to_string(),
                    field_type: FieldType::Email,
                    required: true,
                    ..Default::default()
                },
                FieldDescriptor {
                    name: "amount".to_string(),
                    field_type: FieldType::Number,
                    ..Default::default()
                },
            ],
            credit_cost: 2,
            action,
            is_active: true,
        }
    }

    #[test]
    fn test_template_input_problems() {
        assert!(input(TemplateAction::RecordOnly).problems().is_empty());

        let mut bad = input(TemplateAction::SendEmail {
            subject: "Quote".to_string(),
            html_body: String::new(),
            to_field: "missing".to_string(),
        });
        bad.credit_cost = -1;
        bad.input_schema.push(FieldDescriptor {
            name: "amount".to_string(),
            ..Default::default()
        });

        let fields: Vec<String> = bad.problems().into_iter().map(|(f, _)| f).collect();
        assert!(fields.contains(&"credit_cost".to_string()));
        assert!(fields.contains(&"input_schema".to_string()));
        assert!(fields.contains(&"action.to_field".to_string()));
    }
}
