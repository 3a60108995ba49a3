//! Domain types and rules for the Notaria practice-management app.
//!
//! Nothing here touches storage or the network: entities, form validation,
//! the permission gate, protocol numbering, the workflow instantiation plan
//! and compliance status transitions.

#[macro_use]
mod enums;

pub mod access;
pub mod account;
pub mod client;
pub mod compliance;
pub mod document;
mod error;
pub mod forms;
pub mod integration;
pub mod matter;
pub mod protocol;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use access::{Action, Owned};
pub use account::{NewUser, Role, User};
pub use client::{Client, ClientInput, ClientStatus, ClientType, Lead, LeadInput, LeadStatus};
pub use compliance::{
    AnswerInput, AnswerType, CheckInput, ComplianceAnswer, ComplianceCheck, ComplianceQuestion,
    ComplianceStatus, ComplianceTemplate, EvaluationDecision, WebhookPayload,
};
pub use document::{Document, DocumentEdit, DocumentStatus, NewDocument};
pub use error::CoreError;
pub use forms::{FormData, FormErrors};
pub use integration::{
    Integration, IntegrationInput, IntegrationLog, LogLevel, NewLogEntry, OAuthTokens, ServiceName,
};
pub use matter::{
    Matter, MatterInput, MatterStatus, NewWorkflowStep, StepChange, StepStatus, StepTemplate,
    Workflow, WorkflowStatus, WorkflowStep, WorkflowTemplate,
};
pub use settings::Settings;

/// Current wall-clock time as stored (UTC, naive).
pub fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}
