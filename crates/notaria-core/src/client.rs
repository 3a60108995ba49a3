//! Clients and leads.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::forms::{self, FormData, FormErrors};

string_enum! {
    pub enum ClientType {
        Individual => ("individual", "Individual"),
        Business => ("business", "Business"),
    }
}

string_enum! {
    pub enum ClientStatus {
        Lead => ("lead", "Lead"),
        Active => ("active", "Active"),
        Inactive => ("inactive", "Inactive"),
        Archived => ("archived", "Archived"),
    }
}

string_enum! {
    pub enum LeadStatus {
        New => ("new", "New"),
        Contacted => ("contacted", "Contacted"),
        Qualified => ("qualified", "Qualified"),
        Converted => ("converted", "Converted"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub client_type: ClientType,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub business_name: Option<String>,
    pub registration_number: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub status: ClientStatus,
    pub notes: Option<String>,
    pub segmentation_tags: Vec<String>,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Client {
    /// Business name, else full name, else email, else phone, else `Client #id`.
    pub fn display_name(&self) -> String {
        if self.client_type == ClientType::Business
            && let Some(name) = &self.business_name
        {
            return name.clone();
        }
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        self.email
            .clone()
            .or_else(|| self.phone_number.clone())
            .unwrap_or_else(|| format!("Client #{}", self.id))
    }

    /// Text handed to the AI tagger: everything we know about the client.
    pub fn profile_text(&self) -> String {
        let mut lines = vec![
            format!("Name: {}", self.display_name()),
            format!("Type: {}", self.client_type.label()),
            format!("Status: {}", self.status.label()),
        ];
        let optional = [
            ("Email", &self.email),
            ("Phone", &self.phone_number),
            ("Address", &self.address),
            ("Registration number", &self.registration_number),
            ("Notes", &self.notes),
        ];
        for (label, value) in optional {
            if let Some(v) = value {
                lines.push(format!("{label}: {v}"));
            }
        }
        lines.join("\n")
    }
}

/// Validated client form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInput {
    pub client_type: Option<ClientType>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub business_name: Option<String>,
    pub registration_number: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub status: Option<ClientStatus>,
    pub notes: Option<String>,
}

impl ClientInput {
    pub fn from_form(form: &FormData) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();
        let input = Self {
            client_type: Some(forms::choice(
                form,
                "client_type",
                ClientType::Individual,
                &mut errors,
            )),
            first_name: form.text("first_name"),
            last_name: form.text("last_name"),
            date_of_birth: forms::optional_date(form, "date_of_birth", &mut errors),
            business_name: form.text("business_name"),
            registration_number: form.text("registration_number"),
            email: forms::optional_email(form, "email", &mut errors),
            phone_number: form.text("phone_number"),
            address: form.text("address"),
            status: Some(forms::choice(form, "status", ClientStatus::Lead, &mut errors)),
            notes: form.text("notes"),
        };
        errors.into_result(input)
    }

    pub fn client_type(&self) -> ClientType {
        self.client_type.unwrap_or(ClientType::Individual)
    }

    pub fn status(&self) -> ClientStatus {
        self.status.unwrap_or(ClientStatus::Lead)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub assigned_to: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Lead {
    /// Seed a client record from this lead: the first word of the name
    /// becomes the first name, the rest the last name.
    pub fn to_client_input(&self) -> ClientInput {
        let mut words = self.name.split_whitespace();
        let first = words.next().map(str::to_string);
        let rest = words.collect::<Vec<_>>().join(" ");
        let notes = match (&self.source, &self.notes) {
            (Some(src), Some(n)) => Some(format!("Converted from lead (source: {src}).\n{n}")),
            (Some(src), None) => Some(format!("Converted from lead (source: {src}).")),
            (None, n) => n.clone(),
        };
        ClientInput {
            client_type: Some(ClientType::Individual),
            first_name: first,
            last_name: (!rest.is_empty()).then_some(rest),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            status: Some(ClientStatus::Active),
            notes,
            ..ClientInput::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadInput {
    pub name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub assigned_to: Option<i64>,
}

impl Default for LeadStatus {
    fn default() -> Self {
        LeadStatus::New
    }
}

impl LeadInput {
    pub fn from_form(form: &FormData) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();
        let input = Self {
            name: forms::required_text(form, "name", "This field is required.", &mut errors),
            email: forms::optional_email(form, "email", &mut errors),
            phone_number: form.text("phone_number"),
            source: form.text("source"),
            status: forms::choice(form, "status", LeadStatus::New, &mut errors),
            notes: form.text("notes"),
            assigned_to: forms::optional_id(form, "assigned_to", &mut errors),
        };
        errors.into_result(input)
    }
}
