/// Uploaded tabular data
///
/// Campaign recipient lists arrive as CSV text. The first record is the
/// header row; every later record becomes a [`Row`] keyed by header. Rows may
/// be shorter or longer than the header (spreadsheet exports often are):
/// missing cells read as empty, extra cells are dropped.

use std::collections::{BTreeMap, HashSet};

/// Column name → cell value
pub type Row = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("The file has no header row")]
    MissingHeader,

    #[error("Column {0} has an empty header")]
    EmptyHeader(usize),

    #[error("Column '{0}' appears more than once in the header")]
    DuplicateHeader(String),

    #[error("The file has more than {limit} data rows")]
    TooManyRows { limit: usize },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Header list plus rows
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct TabularData {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl TabularData {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct non-empty values of one column, in first-seen order
    pub fn column_values(&self, column: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter_map(|row| row.get(column).map(String::as_str))
            .filter(|v| !v.trim().is_empty() && seen.insert(*v))
            .collect()
    }
}

/// Parses CSV text
///
/// Headers are trimmed and must be unique and non-empty. A UTF-8 byte-order
/// mark is ignored. Blank lines are skipped. Fails once more than `max_rows`
/// data rows are seen.
pub fn parse_csv(text: &str, max_rows: usize) -> Result<TabularData, DatasetError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(text.as_bytes());

    let raw_headers = reader.headers()?.clone();
    if raw_headers.is_empty() || raw_headers.iter().all(|h| h.trim().is_empty()) {
        return Err(DatasetError::MissingHeader);
    }

    let mut headers = Vec::with_capacity(raw_headers.len());
    let mut seen = HashSet::new();
    for (idx, header) in raw_headers.iter().enumerate() {
        let header = header.trim().to_string();
        if header.is_empty() {
            return Err(DatasetError::EmptyHeader(idx + 1));
        }
        if !seen.insert(header.clone()) {
            return Err(DatasetError::DuplicateHeader(header));
        }
        headers.push(header);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if rows.len() == max_rows {
            return Err(DatasetError::TooManyRows { limit: max_rows });
        }

        let row: Row = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| (header.clone(), record.get(idx).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }

    Ok(TabularData { headers, rows })
}
