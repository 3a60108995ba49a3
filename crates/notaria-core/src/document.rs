//! Uploaded documents.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::forms::{self, FormData, FormErrors};

string_enum! {
    pub enum DocumentStatus {
        Uploaded => ("uploaded", "Uploaded"),
        Processing => ("processing", "Processing"),
        Processed => ("processed", "Processed"),
        Archived => ("archived", "Archived"),
        Error => ("error", "Error"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub uploaded_by: i64,
    /// Relative to the media root.
    pub file: String,
    pub name: String,
    pub file_type: String,
    pub file_size: i64,
    pub upload_date: NaiveDateTime,
    pub client_id: Option<i64>,
    pub matter_id: Option<i64>,
    pub summary: Option<String>,
    pub segmentation_result: Option<Value>,
    pub status: DocumentStatus,
}

impl Document {
    /// File name component of the stored path.
    pub fn file_name(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub uploaded_by: i64,
    pub file: String,
    pub name: String,
    pub file_type: String,
    pub file_size: i64,
    pub client_id: Option<i64>,
    pub matter_id: Option<i64>,
}

/// Metadata edit form (the file itself is not replaced).
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentEdit {
    pub name: String,
    pub client_id: Option<i64>,
    pub matter_id: Option<i64>,
    pub status: DocumentStatus,
}

impl DocumentEdit {
    pub fn from_form(form: &FormData, current: &Document) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();
        let input = Self {
            name: forms::required_text(form, "name", "This field is required.", &mut errors),
            client_id: forms::optional_id(form, "client", &mut errors),
            matter_id: forms::optional_id(form, "matter", &mut errors),
            status: forms::choice(form, "status", current.status, &mut errors),
        };
        errors.into_result(input)
    }
}

/// Upload metadata that came alongside the file part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadFields {
    pub name: Option<String>,
    pub client_id: Option<i64>,
    pub matter_id: Option<i64>,
}

impl UploadFields {
    pub fn from_form(form: &FormData) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();
        let input = Self {
            name: form.text("name"),
            client_id: forms::optional_id(form, "client", &mut errors),
            matter_id: forms::optional_id(form, "matter", &mut errors),
        };
        errors.into_result(input)
    }
}

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content type from the file extension.
pub fn guess_mime(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => OCTET_STREAM,
    }
}

/// Declared content type when useful, else a guess from the name.
pub fn resolve_file_type(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != OCTET_STREAM => ct.to_string(),
        _ => guess_mime(file_name).to_string(),
    }
}
