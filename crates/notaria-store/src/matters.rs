//! Matters and their client/assignee links.

use duckdb::{OptionalExt, Row, Transaction, params};
use notaria_core::protocol;
use notaria_core::{Client, Matter, MatterInput};
use tracing::info;

use crate::error::ConstraintExt;
use crate::store::{date, fmt_date, fmt_opt_date, fmt_ts, opt_date, parsed, ts};
use crate::{Scope, Store, StoreError};

const COLUMNS: &str = "id, protocol_number, title, description, status, start_date, due_date, \
                       completion_date, notes, created_by, created_at, updated_at";

pub const DUPLICATE_PROTOCOL: &str = "A matter with this protocol number already exists.";

fn read_matter(row: &Row<'_>) -> duckdb::Result<Matter> {
    Ok(Matter {
        id: row.get(0)?,
        protocol_number: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: parsed(row, 4)?,
        start_date: date(row, 5)?,
        due_date: opt_date(row, 6)?,
        completion_date: opt_date(row, 7)?,
        notes: row.get(8)?,
        client_ids: Vec::new(),
        assigned_user_ids: Vec::new(),
        created_by: row.get(9)?,
        created_at: ts(row, 10)?,
        updated_at: ts(row, 11)?,
    })
}

/// Bring the link tables in line with `input`. Only changed pairs are
/// touched: re-inserting a key deleted in the same transaction trips the
/// primary-key check.
fn replace_links(tx: &Transaction<'_>, matter_id: i64, input: &MatterInput) -> Result<(), StoreError> {
    sync_links(tx, "matter_clients", "client_id", matter_id, &input.client_ids)?;
    sync_links(tx, "matter_users", "user_id", matter_id, &input.assigned_user_ids)
}

fn sync_links(
    tx: &Transaction<'_>,
    table: &str,
    column: &str,
    matter_id: i64,
    wanted: &[i64],
) -> Result<(), StoreError> {
    let current: Vec<i64> = {
        let mut stmt = tx.prepare(&format!("SELECT {column} FROM {table} WHERE matter_id = ?"))?;
        let rows = stmt.query_map([matter_id], |row| row.get(0))?;
        rows.collect::<Result<_, _>>()?
    };
    for id in current.iter().filter(|id| !wanted.contains(id)) {
        tx.execute(
            &format!("DELETE FROM {table} WHERE matter_id = ? AND {column} = ?"),
            params![matter_id, id],
        )?;
    }
    for id in wanted.iter().filter(|id| !current.contains(id)) {
        tx.execute(
            &format!("INSERT INTO {table} (matter_id, {column}) VALUES (?, ?)"),
            params![matter_id, id],
        )?;
    }
    Ok(())
}

impl Store {
    /// Insert a matter with the next protocol number.
    pub fn create_matter(&mut self, input: &MatterInput, created_by: Option<i64>) -> Result<Matter, StoreError> {
        let now = fmt_ts(notaria_core::now());
        let tx = self.conn.transaction()?;

        let existing: Vec<String> = {
            let mut stmt = tx.prepare("SELECT protocol_number FROM matters")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        let protocol_number = protocol::next(protocol::highest(existing.iter().map(String::as_str)));

        let id: i64 = tx
            .query_row(
                "INSERT INTO matters (protocol_number, title, description, status, start_date, \
                 due_date, completion_date, notes, created_by, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
                params![
                    protocol_number,
                    input.title,
                    input.description,
                    input.status.as_str(),
                    fmt_date(input.start_date),
                    fmt_opt_date(input.due_date),
                    fmt_opt_date(input.completion_date),
                    input.notes,
                    created_by,
                    now,
                    now,
                ],
                |row| row.get(0),
            )
            .on_conflict(DUPLICATE_PROTOCOL)?;
        replace_links(&tx, id, input)?;
        tx.commit()?;

        info!(matter_id = id, protocol = %protocol_number, "created matter");
        self.get_matter(id)
    }

    pub fn update_matter(&mut self, id: i64, input: &MatterInput) -> Result<Matter, StoreError> {
        self.get_matter(id)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE matters SET title = ?, description = ?, status = ?, start_date = ?, due_date = ?, \
             completion_date = ?, notes = ?, updated_at = ? WHERE id = ?",
            params![
                input.title,
                input.description,
                input.status.as_str(),
                fmt_date(input.start_date),
                fmt_opt_date(input.due_date),
                fmt_opt_date(input.completion_date),
                input.notes,
                fmt_ts(notaria_core::now()),
                id,
            ],
        )?;
        replace_links(&tx, id, input)?;
        tx.commit()?;
        info!(matter_id = id, "updated matter");
        self.get_matter(id)
    }

    pub fn set_matter_notes(&self, id: i64, notes: Option<&str>) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE matters SET notes = ?, updated_at = ? WHERE id = ?",
            params![notes, fmt_ts(notaria_core::now()), id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("matter", id));
        }
        Ok(())
    }

    pub fn get_matter(&self, id: i64) -> Result<Matter, StoreError> {
        let mut matter = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM matters WHERE id = ?"),
                [id],
                read_matter,
            )
            .optional()?
            .ok_or(StoreError::not_found("matter", id))?;
        self.load_links(&mut matter)?;
        Ok(matter)
    }

    fn load_links(&self, matter: &mut Matter) -> Result<(), StoreError> {
        matter.client_ids = self.query_list(
            "SELECT client_id FROM matter_clients WHERE matter_id = ? ORDER BY client_id",
            &[&matter.id],
            |row| row.get(0),
        )?;
        matter.assigned_user_ids = self.query_list(
            "SELECT user_id FROM matter_users WHERE matter_id = ? ORDER BY user_id",
            &[&matter.id],
            |row| row.get(0),
        )?;
        Ok(())
    }

    /// Matters visible in `scope`: created by or assigned to the owner.
    pub fn list_matters(&self, scope: Scope) -> Result<Vec<Matter>, StoreError> {
        let mut matters = match scope {
            Scope::All => self.query_list(
                &format!("SELECT {COLUMNS} FROM matters ORDER BY created_at DESC, id DESC"),
                &[],
                read_matter,
            )?,
            Scope::Owner(uid) => self.query_list(
                &format!(
                    "SELECT {COLUMNS} FROM matters WHERE created_by = ? \
                     OR id IN (SELECT matter_id FROM matter_users WHERE user_id = ?) \
                     ORDER BY created_at DESC, id DESC"
                ),
                &[&uid, &uid],
                read_matter,
            )?,
        };
        for matter in &mut matters {
            self.load_links(matter)?;
        }
        Ok(matters)
    }

    pub fn matter_clients(&self, matter: &Matter) -> Result<Vec<Client>, StoreError> {
        self.clients_by_ids(&matter.client_ids)
    }

    /// Delete a matter with its workflow and steps. Checks and documents
    /// that referenced it are kept, unlinked.
    pub fn delete_matter(&mut self, id: i64) -> Result<(), StoreError> {
        self.get_matter(id)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM workflow_steps WHERE workflow_id IN (SELECT id FROM workflows WHERE matter_id = ?)",
            [id],
        )?;
        tx.execute("DELETE FROM workflows WHERE matter_id = ?", [id])?;
        tx.execute("UPDATE compliance_checks SET matter_id = NULL WHERE matter_id = ?", [id])?;
        tx.execute("UPDATE documents SET matter_id = NULL WHERE matter_id = ?", [id])?;
        tx.execute("DELETE FROM matter_clients WHERE matter_id = ?", [id])?;
        tx.execute("DELETE FROM matter_users WHERE matter_id = ?", [id])?;
        tx.execute("DELETE FROM matters WHERE id = ?", [id])?;
        tx.commit()?;
        info!(matter_id = id, "deleted matter");
        Ok(())
    }
}
