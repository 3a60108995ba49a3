//! Fixtures shared by the unit tests in this crate.

use chrono::{NaiveDate, NaiveDateTime};

use crate::account::{Role, User};
use crate::client::{Client, ClientStatus, ClientType, Lead, LeadStatus};
use crate::document::{Document, DocumentStatus};
use crate::matter::{Matter, MatterStatus};

pub fn ts() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

pub fn sample_user(id: i64, role: Role) -> User {
    User {
        id,
        username: format!("user{id}"),
        email: format!("user{id}@example.com"),
        password_hash: String::new(),
        role,
        is_superuser: false,
        is_active: true,
        phone_number: None,
        address: None,
        created_at: ts(),
    }
}

pub fn sample_client(id: i64) -> Client {
    Client {
        id,
        client_type: ClientType::Individual,
        first_name: Some("Ann".into()),
        last_name: Some("Smith".into()),
        date_of_birth: None,
        business_name: None,
        registration_number: None,
        email: Some("ann@example.com".into()),
        phone_number: None,
        address: None,
        status: ClientStatus::Active,
        notes: None,
        segmentation_tags: Vec::new(),
        created_by: Some(1),
        created_at: ts(),
        updated_at: ts(),
    }
}

pub fn sample_lead(id: i64) -> Lead {
    Lead {
        id,
        name: "Bob Brown".into(),
        email: Some("bob@example.com".into()),
        phone_number: None,
        source: None,
        status: LeadStatus::New,
        notes: None,
        assigned_to: Some(1),
        created_at: ts(),
        updated_at: ts(),
    }
}

pub fn sample_matter(id: i64) -> Matter {
    Matter {
        id,
        protocol_number: crate::protocol::format(id as u64),
        title: "Purchase of 1 High Street".into(),
        description: None,
        status: MatterStatus::Open,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        due_date: None,
        completion_date: None,
        notes: Some("Initial call done".into()),
        client_ids: Vec::new(),
        assigned_user_ids: Vec::new(),
        created_by: Some(1),
        created_at: ts(),
        updated_at: ts(),
    }
}

pub fn sample_document(id: i64, uploaded_by: i64) -> Document {
    Document {
        id,
        uploaded_by,
        file: "documents/2024/01/15/deed.txt".into(),
        name: "Deed".into(),
        file_type: "text/plain".into(),
        file_size: 12,
        upload_date: ts(),
        client_id: None,
        matter_id: None,
        summary: None,
        segmentation_result: None,
        status: DocumentStatus::Uploaded,
    }
}
