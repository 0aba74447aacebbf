/// `{placeholder}` merge for email subjects and HTML bodies
///
/// Placeholders are identifiers in single braces: `{name}`, `{order_total}`,
/// `{client.city}`. Anything else in braces (inline CSS, JSON snippets) is
/// left alone. A placeholder with no value is kept verbatim so previews show
/// what's still unmapped instead of silently blanking it.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use wfahub_shared::templating::{render, unresolved};
///
/// let mut vars = BTreeMap::new();
/// vars.insert("name".to_string(), "Ana".to_string());
///
/// let html = "Hello {name}, total {amount}";
/// assert_eq!(render(html, &vars), "Hello Ana, total {amount}");
/// assert_eq!(unresolved(html, &vars), vec!["amount"]);
/// ```

use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

const PLACEHOLDER_PATTERN: &str = r"\{([A-Za-z_][A-Za-z0-9_.\-]*)\}";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern compiles"))
}

/// Substitutes values verbatim
///
/// Use for plain-text targets such as subject lines.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> String {
    substitute(template, vars, |v| v.to_string())
}

/// Substitutes HTML-escaped values
///
/// Use when merging user data into an HTML body so a cell containing markup
/// can't inject elements into the message.
pub fn render_html(template: &str, vars: &BTreeMap<String, String>) -> String {
    substitute(template, vars, escape_html)
}

fn substitute(
    template: &str,
    vars: &BTreeMap<String, String>,
    encode: impl Fn(&str) -> String,
) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => encode(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Distinct placeholder names in order of first appearance
pub fn placeholders(template: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    placeholder_regex()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Placeholders with no value in `vars`
pub fn unresolved(template: &str, vars: &BTreeMap<String, String>) -> Vec<String> {
    placeholders(template)
        .into_iter()
        .filter(|name| !vars.contains_key(name))
        .collect()
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
