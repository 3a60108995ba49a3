//! Submitted form data and field-level validation errors.
//!
//! Handlers receive url-encoded (or multipart text) fields as ordered
//! `(name, value)` pairs. Each domain module turns a [`FormData`] into its
//! typed input (`MatterInput::from_form`, `ClientInput::from_form`, ...) or a
//! [`FormErrors`] map that the web layer shows as flash messages.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

/// Ordered form fields as submitted by the browser.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    pairs: Vec<(String, String)>,
}

impl FormData {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Build from borrowed pairs (mostly for tests).
    pub fn from_slice(pairs: &[(&str, &str)]) -> Self {
        Self {
            pairs: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// First raw value for `name`, untrimmed.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value for `name`, trimmed; `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.raw(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Every non-blank value submitted under `name` (multi-selects).
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Checkbox semantics: present with a truthy value.
    pub fn flag(&self, name: &str) -> bool {
        self.raw(name).is_some_and(is_truthy)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Field name → messages. Empty means the form is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.fields {
            self.fields.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(value)` when no errors were recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            tracing::debug!(fields = ?self.fields.keys().collect::<Vec<_>>(), "form rejected");
            Err(self)
        }
    }

    /// Flash-ready messages: `Error in <field>: <message>`.
    pub fn messages(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("Error in {field}: {m}")))
            .collect()
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

// ── Field parsers ──
//
// Each parser records a message in `errors` and returns `None`/default on
// failure so that a single pass collects every problem in the form.

pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| "Enter a valid date (YYYY-MM-DD).".to_string())
}

/// Required text field.
pub fn required_text(
    form: &FormData,
    name: &str,
    message: &str,
    errors: &mut FormErrors,
) -> String {
    match form.text(name) {
        Some(v) => v,
        None => {
            errors.add(name, message);
            String::new()
        }
    }
}

/// Optional `YYYY-MM-DD` field.
pub fn optional_date(form: &FormData, name: &str, errors: &mut FormErrors) -> Option<NaiveDate> {
    let raw = form.text(name)?;
    match parse_date(&raw) {
        Ok(d) => Some(d),
        Err(msg) => {
            errors.add(name, msg);
            None
        }
    }
}

/// Choice field backed by a string enum; absent means `default`.
pub fn choice<T>(form: &FormData, name: &str, default: T, errors: &mut FormErrors) -> T
where
    T: FromStr + Copy,
{
    match form.text(name) {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                errors.add(name, format!("Select a valid choice. {raw} is not one of the available choices."));
                default
            }
        },
    }
}

/// Optional foreign-key field (`<select>` of ids).
pub fn optional_id(form: &FormData, name: &str, errors: &mut FormErrors) -> Option<i64> {
    let raw = form.text(name)?;
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Some(id),
        _ => {
            errors.add(name, "Select a valid choice.");
            None
        }
    }
}

/// Multi-select of ids; duplicates removed, submission order kept.
pub fn id_list(form: &FormData, name: &str, errors: &mut FormErrors) -> Vec<i64> {
    let mut ids = Vec::new();
    for raw in form.all(name) {
        match raw.parse::<i64>() {
            Ok(id) if id > 0 => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            _ => errors.add(name, format!("{raw} is not a valid value.")),
        }
    }
    ids
}

/// Non-negative integer field with a default.
pub fn non_negative_int(form: &FormData, name: &str, default: i32, errors: &mut FormErrors) -> i32 {
    match form.text(name) {
        None => default,
        Some(raw) => match raw.parse::<i32>() {
            Ok(v) if v >= 0 => v,
            _ => {
                errors.add(name, "Ensure this value is a whole number greater than or equal to 0.");
                default
            }
        },
    }
}

/// Loose address check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
}

/// Optional email field.
pub fn optional_email(form: &FormData, name: &str, errors: &mut FormErrors) -> Option<String> {
    let raw = form.text(name)?;
    if is_valid_email(&raw) {
        Some(raw)
    } else {
        errors.add(name, "Enter a valid email address.");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_trims_and_drops_blank() {
        let form = FormData::from_slice(&[("title", "  Deed  "), ("notes", "   ")]);
        assert_eq!(form.text("title").as_deref(), Some("Deed"));
        assert_eq!(form.text("notes"), None);
        assert_eq!(form.text("missing"), None);
    }

    #[test]
    fn multi_select_dedupes_ids() {
        let form = FormData::from_slice(&[("clients", "3"), ("clients", "1"), ("clients", "3")]);
        let mut errors = FormErrors::new();
        assert_eq!(id_list(&form, "clients", &mut errors), vec![3, 1]);
        assert!(errors.is_empty());
    }

    #[test]
    fn bad_id_is_reported() {
        let form = FormData::from_slice(&[("clients", "abc")]);
        let mut errors = FormErrors::new();
        assert!(id_list(&form, "clients", &mut errors).is_empty());
        assert!(errors.has("clients"));
    }

    #[test]
    fn date_parsing() {
        assert!(parse_date("2024-02-29").is_ok());
        assert!(parse_date("2023-02-29").is_err());
        assert!(parse_date("29/02/2024").is_err());
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("notary@example.co.uk"));
        assert!(!is_valid_email("notary@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("no tary@example.com"));
        assert!(!is_valid_email("notary.example.com"));
    }

    #[test]
    fn messages_are_prefixed_with_field() {
        let mut errors = FormErrors::new();
        errors.add("due_date", "Due date cannot be before the start date.");
        assert_eq!(
            errors.messages(),
            vec!["Error in due_date: Due date cannot be before the start date.".to_string()]
        );
    }

    #[test]
    fn flag_semantics() {
        let form = FormData::from_slice(&[("is_enabled", "on"), ("is_required", "false")]);
        assert!(form.flag("is_enabled"));
        assert!(!form.flag("is_required"));
        assert!(!form.flag("absent"));
    }
}
