//! Outbound integrations: Credas identity verification, PEPs/sanctions
//! screening, Zoom meetings and Gmail (OAuth2 + send).
//!
//! Every client takes its base URLs from settings so it can be pointed at a
//! sandbox or a local fake. Clients are cheap to build per request; none of
//! them touch the database. Callers persist references, tokens and
//! integration log rows.

mod error;
pub use error::IntegrationError;

pub mod credas;
pub mod gmail;
mod http;
pub mod sanctions;
pub mod zoom;

#[cfg(test)]
pub(crate) mod testing;

pub use credas::CredasClient;
pub use gmail::GmailClient;
pub use sanctions::SanctionsClient;
pub use zoom::ZoomClient;

use chrono::NaiveDate;
use notaria_core::Client;
use serde::Serialize;

/// The person or business submitted for verification or screening.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subject {
    pub client_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
}

impl From<&Client> for Subject {
    fn from(client: &Client) -> Self {
        Self {
            client_id: client.id,
            first_name: client.first_name.clone(),
            last_name: client.last_name.clone(),
            name: client.display_name(),
            date_of_birth: client.date_of_birth,
        }
    }
}
