/// Server-side validation of template form submissions
///
/// The client renders a form from a template's input schema, but nothing it
/// sends is trusted: [`validate_inputs`] re-checks every field and returns the
/// cleaned values as strings (the form the templating layer consumes).
/// Keys that aren't in the schema are dropped.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use wfahub_shared::models::template::{FieldDescriptor, FieldType};
/// use wfahub_shared::schema::validate_inputs;
///
/// let schema = vec![FieldDescriptor {
///     name: "email".to_string(),
///     field_type: FieldType::Email,
///     required: true,
///     ..Default::default()
/// }];
///
/// let ok = validate_inputs(&schema, &json!({"email": "ana@example.com", "extra": 1})).unwrap();
/// assert_eq!(ok.len(), 1);
///
/// let errors = validate_inputs(&schema, &json!({"email": "nope"})).unwrap_err();
/// assert_eq!(errors[0].field, "email");
/// ```

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use validator::{ValidateEmail, ValidateUrl};

use crate::models::template::{FieldDescriptor, FieldType};

/// One rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    value.validate_email()
}

fn is_valid_phone(value: &str) -> bool {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    digits >= 6
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'))
}

/// Scalar JSON → string; None for null/absent, Err for arrays and objects
fn scalar_to_string(value: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.trim().to_string())),
        Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
        Some(JsonValue::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err("Must be a single value"),
    }
}

/// Validates submitted values against a schema
///
/// Returns every problem at once rather than stopping at the first. Optional
/// fields left blank are omitted from the result.
pub fn validate_inputs(
    schema: &[FieldDescriptor],
    inputs: &JsonValue,
) -> Result<BTreeMap<String, String>, Vec<FieldError>> {
    let empty = serde_json::Map::new();
    let object = match inputs {
        JsonValue::Object(map) => map,
        JsonValue::Null => &empty,
        _ => return Err(vec![FieldError::new("inputs", "Inputs must be a JSON object")]),
    };

    let mut values = BTreeMap::new();
    let mut errors = Vec::new();

    for field in schema {
        let value = match scalar_to_string(object.get(&field.name)) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(message) => {
                errors.push(FieldError::new(&field.name, message));
                continue;
            }
        };

        let Some(value) = value else {
            if field.required {
                errors.push(FieldError::new(
                    &field.name,
                    format!("{} is required", field.display_label()),
                ));
            }
            continue;
        };

        if let Err(message) = check_value(field, &value) {
            errors.push(FieldError::new(&field.name, message));
            continue;
        }

        values.insert(field.name.clone(), value);
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

fn check_value(field: &FieldDescriptor, value: &str) -> Result<(), String> {
    match &field.field_type {
        FieldType::Email if !is_valid_email(value) => Err("Invalid email address".to_string()),
        FieldType::Url if !value.validate_url() => Err("Invalid URL".to_string()),
        FieldType::Phone if !is_valid_phone(value) => Err("Invalid phone number".to_string()),
        FieldType::Date if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() => {
            Err("Date must be in YYYY-MM-DD format".to_string())
        }
        FieldType::Number => {
            let number: f64 = value
                .parse()
                .ok()
                .filter(|n: &f64| n.is_finite())
                .ok_or_else(|| "Must be a number".to_string())?;
            if let Some(min) = field.min {
                if number < min {
                    return Err(format!("Must be at least {}", min));
                }
            }
            if let Some(max) = field.max {
                if number > max {
                    return Err(format!("Must be at most {}", max));
                }
            }
            Ok(())
        }
        FieldType::Select if !field.options.is_empty() && !field.options.iter().any(|o| o == value) => {
            Err(format!("Must be one of: {}", field.options.join(", ")))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(name: &str, field_type: FieldType, required: bool) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            field_type,
            required,
            ..Default::default()
        }
    }

    fn quote_schema() -> Vec<FieldDescriptor> {
        vec![
            field("client_email", FieldType::Email, true),
            FieldDescriptor {
                min: Some(1.0),
                max: Some(1000.0),
                ..field("amount", FieldType::Number, true)
            },
            FieldDescriptor {
                options: vec!["EUR".into(), "USD".into()],
                ..field("currency", FieldType::Select, false)
            },
            field("due", FieldType::Date, false),
            field("notes", FieldType::Textarea, false),
        ]
    }

    #[test]
    fn test_valid_submission() {
        let values = validate_inputs(
            &quote_schema(),
            &json!({
                "client_email": " buyer@acme.test ",
                "amount": 250,
                "currency": "EUR",
                "due": "2025-03-01",
                "unknown": "ignored"
            }),
        )
        .unwrap();

        assert_eq!(values["client_email"], "buyer@acme.test");
        assert_eq!(values["amount"], "250");
        assert!(!values.contains_key("unknown"));
        assert!(!values.contains_key("notes"));
    }

    #[test]
    fn test_all_errors_reported() {
        let errors = validate_inputs(
            &quote_schema(),
            &json!({
                "client_email": "not-an-email",
                "amount": "5000",
                "currency": "GBP",
                "due": "01/03/2025"
            }),
        )
        .unwrap_err();

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["client_email", "amount", "currency", "due"]);
        assert_eq!(errors[1].message, "Must be at most 1000");
    }

    #[test]
    fn test_required_blank_and_missing() {
        let errors = validate_inputs(&quote_schema(), &json!({"client_email": "   "})).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("required"));
    }

    #[test]
    fn test_non_numeric_and_nested_values() {
        let schema = vec![field("n", FieldType::Number, true), field("t", FieldType::Text, false)];
        let errors = validate_inputs(&schema, &json!({"n": "abc", "t": {"x": 1}})).unwrap_err();
        assert_eq!(errors[0].message, "Must be a number");
        assert_eq!(errors[1].message, "Must be a single value");

        let errors = validate_inputs(&schema, &json!({"n": "NaN"})).unwrap_err();
        assert_eq!(errors[0].message, "Must be a number");
    }

    #[test]
    fn test_non_object_inputs() {
        let errors = validate_inputs(&quote_schema(), &json!([1, 2])).unwrap_err();
        assert_eq!(errors[0].field, "inputs");

        // null is an empty submission
        assert!(validate_inputs(&[], &JsonValue::Null).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_field_types_accept_anything() {
        let schema = vec![field("sig", FieldType::Other("signature".into()), true)];
        assert!(validate_inputs(&schema, &json!({"sig": "<svg/>"})).is_ok());
    }

    #[test]
    fn test_phone_and_url() {
        let schema = vec![field("p", FieldType::Phone, false), field("u", FieldType::Url, false)];
        assert!(validate_inputs(&schema, &json!({"p": "+351 912 345 678", "u": "https://a.io"})).is_ok());
        assert_eq!(
            validate_inputs(&schema, &json!({"p": "call me", "u": "nope"})).unwrap_err().len(),
            2
        );
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email(""));
    }
}
