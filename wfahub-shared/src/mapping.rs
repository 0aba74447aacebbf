/// Column-to-field mapping for bulk sends
///
/// A user uploads a table, then tells us which column feeds which template
/// variable. The `email` mapping is always present because every projected
/// row needs a recipient; it can be re-pointed at another column but never
/// hidden or removed. Other mappings can be hidden (kept, but ignored when
/// projecting) and restored later.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use wfahub_shared::mapping::MappingSet;
///
/// # fn example() -> Result<(), wfahub_shared::mapping::MappingError> {
/// let headers = vec!["E-mail".to_string(), "Client".to_string()];
///
/// let mut mappings = MappingSet::new();
/// mappings.set_column("email", "E-mail")?;
/// mappings.add("name", "Client")?;
///
/// let resolved = mappings.resolve(&headers)?;
///
/// let row = BTreeMap::from([
///     ("E-mail".to_string(), "ana@example.com".to_string()),
///     ("Client".to_string(), "Ana".to_string()),
/// ]);
/// let vars = resolved.project(&row);
/// assert_eq!(vars["name"], "Ana");
/// assert!(mappings.hide("email").is_err());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::dataset::Row;

/// Name of the mapping every set must keep
pub const EMAIL_FIELD: &str = "email";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("The email mapping is required and cannot be hidden or removed")]
    EmailLocked,

    #[error("Field '{0}' is mapped more than once")]
    DuplicateField(String),

    #[error("No mapping for field '{0}'")]
    UnknownField(String),

    #[error("Field name cannot be empty")]
    EmptyField,

    #[error("Choose the column that holds recipient email addresses")]
    MissingEmailColumn,

    #[error("Field '{field}' is mapped to column '{column}', which is not in the file")]
    UnknownColumn { field: String, column: String },
}

/// One template variable ← data column association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field_name: String,

    /// Empty until the user picks a column
    #[serde(default)]
    pub column_name: String,

    #[serde(default)]
    pub hidden: bool,
}

impl FieldMapping {
    pub fn new(field_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            column_name: column_name.into(),
            hidden: false,
        }
    }

    pub fn is_email(&self) -> bool {
        self.field_name == EMAIL_FIELD
    }
}

/// Ordered list of mappings with the email mapping pinned first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingSet {
    mappings: Vec<FieldMapping>,
}

impl Default for MappingSet {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingSet {
    /// A set holding only the (unassigned) email mapping
    pub fn new() -> Self {
        Self {
            mappings: vec![FieldMapping::new(EMAIL_FIELD, "")],
        }
    }

    /// Builds a set from client-submitted pairs
    ///
    /// The email mapping is added if absent. Duplicate field names and a
    /// hidden email mapping are rejected.
    pub fn from_mappings(pairs: Vec<FieldMapping>) -> Result<Self, MappingError> {
        let mut set = Self::new();
        let mut email_seen = false;

        for pair in pairs {
            let field = pair.field_name.trim().to_string();
            if field == EMAIL_FIELD {
                if pair.hidden {
                    return Err(MappingError::EmailLocked);
                }
                if email_seen {
                    return Err(MappingError::DuplicateField(field));
                }
                email_seen = true;
                set.mappings[0].column_name = pair.column_name.trim().to_string();
                continue;
            }

            set.add(&field, pair.column_name.trim())?;
            if pair.hidden {
                set.hide(&field)?;
            }
        }

        Ok(set)
    }

    fn position(&self, field: &str) -> Option<usize> {
        self.mappings.iter().position(|m| m.field_name == field)
    }

    /// Appends a mapping
    pub fn add(&mut self, field: &str, column: &str) -> Result<(), MappingError> {
        let field = field.trim();
        if field.is_empty() {
            return Err(MappingError::EmptyField);
        }
        if self.position(field).is_some() {
            return Err(MappingError::DuplicateField(field.to_string()));
        }

        self.mappings.push(FieldMapping::new(field, column.trim()));
        Ok(())
    }

    /// Points an existing mapping at another column
    pub fn set_column(&mut self, field: &str, column: &str) -> Result<(), MappingError> {
        let idx = self
            .position(field)
            .ok_or_else(|| MappingError::UnknownField(field.to_string()))?;
        self.mappings[idx].column_name = column.trim().to_string();
        Ok(())
    }

    pub fn hide(&mut self, field: &str) -> Result<(), MappingError> {
        self.set_hidden(field, true)
    }

    pub fn restore(&mut self, field: &str) -> Result<(), MappingError> {
        self.set_hidden(field, false)
    }

    fn set_hidden(&mut self, field: &str, hidden: bool) -> Result<(), MappingError> {
        if field == EMAIL_FIELD && hidden {
            return Err(MappingError::EmailLocked);
        }
        let idx = self
            .position(field)
            .ok_or_else(|| MappingError::UnknownField(field.to_string()))?;
        self.mappings[idx].hidden = hidden;
        Ok(())
    }

    /// Deletes a mapping for good
    pub fn remove(&mut self, field: &str) -> Result<FieldMapping, MappingError> {
        if field == EMAIL_FIELD {
            return Err(MappingError::EmailLocked);
        }
        let idx = self
            .position(field)
            .ok_or_else(|| MappingError::UnknownField(field.to_string()))?;
        Ok(self.mappings.remove(idx))
    }

    pub fn all(&self) -> &[FieldMapping] {
        &self.mappings
    }

    pub fn visible(&self) -> Vec<&FieldMapping> {
        self.mappings.iter().filter(|m| !m.hidden).collect()
    }

    pub fn hidden(&self) -> Vec<&FieldMapping> {
        self.mappings.iter().filter(|m| m.hidden).collect()
    }

    pub fn into_mappings(self) -> Vec<FieldMapping> {
        self.mappings
    }

    /// Fills unassigned mappings from headers with a matching name
    ///
    /// Matching ignores case, spaces, dashes and underscores, so `First Name`
    /// fills `first_name`. Returns how many mappings were filled.
    pub fn auto_map(&mut self, headers: &[String]) -> usize {
        let mut filled = 0;
        for mapping in self.mappings.iter_mut().filter(|m| m.column_name.is_empty()) {
            let wanted = simplify(&mapping.field_name);
            let found = headers.iter().find(|h| {
                let header = simplify(h);
                header == wanted || (mapping.is_email() && (header == "mail" || header == "emailaddress"))
            });
            if let Some(header) = found {
                mapping.column_name = header.clone();
                filled += 1;
            }
        }
        filled
    }

    /// Checks the visible mappings against a file's headers
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedMapping, MappingError> {
        let known: HashSet<&str> = headers.iter().map(String::as_str).collect();
        let mut pairs = Vec::new();

        for mapping in self.visible() {
            if mapping.column_name.is_empty() {
                if mapping.is_email() {
                    return Err(MappingError::MissingEmailColumn);
                }
                continue;
            }
            if !known.contains(mapping.column_name.as_str()) {
                return Err(MappingError::UnknownColumn {
                    field: mapping.field_name.clone(),
                    column: mapping.column_name.clone(),
                });
            }
            pairs.push((mapping.field_name.clone(), mapping.column_name.clone()));
        }

        Ok(ResolvedMapping { pairs })
    }

    /// Projects a row through the visible mappings without header checks
    ///
    /// Missing columns yield empty strings; unassigned mappings are skipped.
    pub fn project(&self, row: &Row) -> BTreeMap<String, String> {
        self.visible()
            .into_iter()
            .filter(|m| !m.column_name.is_empty())
            .map(|m| {
                let value = row.get(&m.column_name).cloned().unwrap_or_default();
                (m.field_name.clone(), value)
            })
            .collect()
    }
}

fn simplify(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Field → column lookup validated against a header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    pairs: Vec<(String, String)>,
}

impl ResolvedMapping {
    pub fn column_for(&self, field: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, c)| c.as_str())
    }

    /// Turns a data row into template variables, trimming values
    pub fn project(&self, row: &Row) -> BTreeMap<String, String> {
        self.pairs
            .iter()
            .map(|(field, column)| {
                let value = row.get(column).map(|v| v.trim().to_string()).unwrap_or_default();
                (field.clone(), value)
            })
            .collect()
    }
}
