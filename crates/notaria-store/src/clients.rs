//! Clients and leads.

use duckdb::{OptionalExt, Row, params};
use notaria_core::{Client, ClientInput, Lead, LeadInput, LeadStatus};
use tracing::info;

use crate::store::{fmt_list, fmt_opt_date, fmt_ts, list, opt_date, parsed, ts};
use crate::{Scope, Store, StoreError};

const CLIENT_COLUMNS: &str = "id, client_type, first_name, last_name, date_of_birth, business_name, \
                              registration_number, email, phone_number, address, status, notes, \
                              segmentation_tags, created_by, created_at, updated_at";

const LEAD_COLUMNS: &str = "id, name, email, phone_number, source, status, notes, assigned_to, \
                            created_at, updated_at";

fn read_client(row: &Row<'_>) -> duckdb::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        client_type: parsed(row, 1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        date_of_birth: opt_date(row, 4)?,
        business_name: row.get(5)?,
        registration_number: row.get(6)?,
        email: row.get(7)?,
        phone_number: row.get(8)?,
        address: row.get(9)?,
        status: parsed(row, 10)?,
        notes: row.get(11)?,
        segmentation_tags: list(row, 12)?,
        created_by: row.get(13)?,
        created_at: ts(row, 14)?,
        updated_at: ts(row, 15)?,
    })
}

fn read_lead(row: &Row<'_>) -> duckdb::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone_number: row.get(3)?,
        source: row.get(4)?,
        status: parsed(row, 5)?,
        notes: row.get(6)?,
        assigned_to: row.get(7)?,
        created_at: ts(row, 8)?,
        updated_at: ts(row, 9)?,
    })
}

impl Store {
    // ── Clients ──

    pub fn create_client(&self, input: &ClientInput, created_by: Option<i64>) -> Result<Client, StoreError> {
        let now = fmt_ts(notaria_core::now());
        let id: i64 = self.conn.query_row(
            "INSERT INTO clients (client_type, first_name, last_name, date_of_birth, business_name, \
             registration_number, email, phone_number, address, status, notes, created_by, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            params![
                input.client_type().as_str(),
                input.first_name,
                input.last_name,
                fmt_opt_date(input.date_of_birth),
                input.business_name,
                input.registration_number,
                input.email,
                input.phone_number,
                input.address,
                input.status().as_str(),
                input.notes,
                created_by,
                now,
                now,
            ],
            |row| row.get(0),
        )?;
        info!(client_id = id, "created client");
        self.get_client(id)
    }

    pub fn update_client(&self, id: i64, input: &ClientInput) -> Result<Client, StoreError> {
        let changed = self.conn.execute(
            "UPDATE clients SET client_type = ?, first_name = ?, last_name = ?, date_of_birth = ?, \
             business_name = ?, registration_number = ?, email = ?, phone_number = ?, address = ?, \
             status = ?, notes = ?, updated_at = ? WHERE id = ?",
            params![
                input.client_type().as_str(),
                input.first_name,
                input.last_name,
                fmt_opt_date(input.date_of_birth),
                input.business_name,
                input.registration_number,
                input.email,
                input.phone_number,
                input.address,
                input.status().as_str(),
                input.notes,
                fmt_ts(notaria_core::now()),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("client", id));
        }
        self.get_client(id)
    }

    pub fn get_client(&self, id: i64) -> Result<Client, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"),
                [id],
                read_client,
            )
            .optional()?
            .ok_or(StoreError::not_found("client", id))
    }

    pub fn list_clients(&self, scope: Scope) -> Result<Vec<Client>, StoreError> {
        match scope {
            Scope::All => self.query_list(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC, id DESC"),
                &[],
                read_client,
            ),
            Scope::Owner(uid) => self.query_list(
                &format!(
                    "SELECT {CLIENT_COLUMNS} FROM clients WHERE created_by = ? \
                     ORDER BY created_at DESC, id DESC"
                ),
                &[&uid],
                read_client,
            ),
        }
    }

    pub fn client_ids(&self) -> Result<Vec<i64>, StoreError> {
        self.query_list("SELECT id FROM clients", &[], |row| row.get(0))
    }

    pub fn clients_by_ids(&self, ids: &[i64]) -> Result<Vec<Client>, StoreError> {
        ids.iter().map(|id| self.get_client(*id)).collect()
    }

    pub fn set_segmentation_tags(&self, id: i64, tags: &[String]) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE clients SET segmentation_tags = ?, updated_at = ? WHERE id = ?",
            params![fmt_list(tags), fmt_ts(notaria_core::now()), id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("client", id));
        }
        info!(client_id = id, tags = tags.len(), "stored segmentation tags");
        Ok(())
    }

    /// Delete a client. Checks and documents keep existing without it and
    /// matter links are dropped.
    pub fn delete_client(&mut self, id: i64) -> Result<(), StoreError> {
        self.get_client(id)?;
        let tx = self.conn.transaction()?;
        tx.execute("UPDATE compliance_checks SET client_id = NULL WHERE client_id = ?", [id])?;
        tx.execute("UPDATE documents SET client_id = NULL WHERE client_id = ?", [id])?;
        tx.execute("DELETE FROM matter_clients WHERE client_id = ?", [id])?;
        tx.execute("DELETE FROM clients WHERE id = ?", [id])?;
        tx.commit()?;
        info!(client_id = id, "deleted client");
        Ok(())
    }

    // ── Leads ──

    pub fn create_lead(&self, input: &LeadInput) -> Result<Lead, StoreError> {
        let now = fmt_ts(notaria_core::now());
        let id: i64 = self.conn.query_row(
            "INSERT INTO leads (name, email, phone_number, source, status, notes, assigned_to, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            params![
                input.name,
                input.email,
                input.phone_number,
                input.source,
                input.status.as_str(),
                input.notes,
                input.assigned_to,
                now,
                now,
            ],
            |row| row.get(0),
        )?;
        info!(lead_id = id, "created lead");
        self.get_lead(id)
    }

    pub fn update_lead(&self, id: i64, input: &LeadInput) -> Result<Lead, StoreError> {
        let changed = self.conn.execute(
            "UPDATE leads SET name = ?, email = ?, phone_number = ?, source = ?, status = ?, \
             notes = ?, assigned_to = ?, updated_at = ? WHERE id = ?",
            params![
                input.name,
                input.email,
                input.phone_number,
                input.source,
                input.status.as_str(),
                input.notes,
                input.assigned_to,
                fmt_ts(notaria_core::now()),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("lead", id));
        }
        self.get_lead(id)
    }

    pub fn get_lead(&self, id: i64) -> Result<Lead, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?"),
                [id],
                read_lead,
            )
            .optional()?
            .ok_or(StoreError::not_found("lead", id))
    }

    pub fn list_leads(&self, scope: Scope) -> Result<Vec<Lead>, StoreError> {
        match scope {
            Scope::All => self.query_list(
                &format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC, id DESC"),
                &[],
                read_lead,
            ),
            Scope::Owner(uid) => self.query_list(
                &format!(
                    "SELECT {LEAD_COLUMNS} FROM leads WHERE assigned_to = ? \
                     ORDER BY created_at DESC, id DESC"
                ),
                &[&uid],
                read_lead,
            ),
        }
    }

    pub fn delete_lead(&self, id: i64) -> Result<(), StoreError> {
        let changed = self.conn.execute("DELETE FROM leads WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(StoreError::not_found("lead", id));
        }
        info!(lead_id = id, "deleted lead");
        Ok(())
    }

    /// Create a client from a lead and mark the lead converted.
    pub fn convert_lead(&mut self, id: i64, created_by: Option<i64>) -> Result<Client, StoreError> {
        let lead = self.get_lead(id)?;
        if lead.status == LeadStatus::Converted {
            return Err(StoreError::Conflict("This lead has already been converted.".into()));
        }
        let input = lead.to_client_input();
        let now = fmt_ts(notaria_core::now());

        let tx = self.conn.transaction()?;
        let client_id: i64 = tx.query_row(
            "INSERT INTO clients (client_type, first_name, last_name, email, phone_number, status, \
             notes, created_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            params![
                input.client_type().as_str(),
                input.first_name,
                input.last_name,
                input.email,
                input.phone_number,
                input.status().as_str(),
                input.notes,
                created_by,
                now,
                now,
            ],
            |row| row.get(0),
        )?;
        tx.execute(
            "UPDATE leads SET status = ?, updated_at = ? WHERE id = ?",
            params![LeadStatus::Converted.as_str(), now, id],
        )?;
        tx.commit()?;
        info!(lead_id = id, client_id, "converted lead");
        self.get_client(client_id)
    }
}
