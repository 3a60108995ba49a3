//! User accounts.

use duckdb::{OptionalExt, Row, params};
use notaria_core::account::verify_password;
use notaria_core::{NewUser, User};
use tracing::info;

use crate::error::ConstraintExt;
use crate::media::Media;
use crate::store::{fmt_ts, parsed, ts};
use crate::{Store, StoreError};

const COLUMNS: &str = "id, username, email, password_hash, role, is_superuser, is_active, \
                       phone_number, address, created_at";

fn read_user(row: &Row<'_>) -> duckdb::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: parsed(row, 4)?,
        is_superuser: row.get(5)?,
        is_active: row.get(6)?,
        phone_number: row.get(7)?,
        address: row.get(8)?,
        created_at: ts(row, 9)?,
    })
}

impl Store {
    pub fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let id: i64 = self
            .conn
            .query_row(
                "INSERT INTO users (username, email, password_hash, role, is_superuser, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
                params![
                    user.username,
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.is_superuser,
                    fmt_ts(notaria_core::now()),
                ],
                |row| row.get(0),
            )
            .on_conflict("A user with that username already exists.")?;
        info!(user_id = id, username = %user.username, role = %user.role, "created user");
        self.get_user(id)
    }

    pub fn get_user(&self, id: i64) -> Result<User, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE id = ?"),
                [id],
                read_user,
            )
            .optional()?
            .ok_or(StoreError::not_found("user", id))
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE username = ?"),
                [username],
                read_user,
            )
            .optional()?)
    }

    /// Active user whose password matches, if any.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .find_user_by_username(username)?
            .filter(|u| u.is_active && verify_password(password, &u.password_hash)))
    }

    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.query_list(
            &format!("SELECT {COLUMNS} FROM users ORDER BY username"),
            &[],
            read_user,
        )
    }

    pub fn user_ids(&self) -> Result<Vec<i64>, StoreError> {
        self.query_list("SELECT id FROM users", &[], |row| row.get(0))
    }

    /// Delete a user. Their uploaded documents (and files) go with them;
    /// every other reference is cleared.
    pub fn delete_user(&mut self, id: i64, media: &Media) -> Result<(), StoreError> {
        self.get_user(id)?;
        let files: Vec<String> =
            self.query_list("SELECT file FROM documents WHERE uploaded_by = ?", &[&id], |row| row.get(0))?;

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM documents WHERE uploaded_by = ?", [id])?;
        tx.execute("UPDATE clients SET created_by = NULL WHERE created_by = ?", [id])?;
        tx.execute("UPDATE leads SET assigned_to = NULL WHERE assigned_to = ?", [id])?;
        tx.execute("UPDATE matters SET created_by = NULL WHERE created_by = ?", [id])?;
        tx.execute("DELETE FROM matter_users WHERE user_id = ?", [id])?;
        tx.execute("UPDATE workflow_steps SET assigned_to = NULL WHERE assigned_to = ?", [id])?;
        tx.execute("UPDATE compliance_checks SET initiated_by = NULL WHERE initiated_by = ?", [id])?;
        tx.execute("UPDATE compliance_answers SET answered_by = NULL WHERE answered_by = ?", [id])?;
        tx.execute("DELETE FROM users WHERE id = ?", [id])?;
        tx.commit()?;

        for file in &files {
            media.remove(file)?;
        }
        info!(user_id = id, documents = files.len(), "deleted user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notaria_core::Role;

    #[test]
    fn duplicate_username_is_conflict() {
        let store = Store::open().unwrap();
        store
            .create_user(&NewUser::new("ann", "ann@example.com", "password1", Role::Notary))
            .unwrap();
        let err = store
            .create_user(&NewUser::new("ann", "other@example.com", "password1", Role::Notary))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn authenticate_checks_password() {
        let store = Store::open().unwrap();
        let user = store
            .create_user(&NewUser::new("ann", "ann@example.com", "password1", Role::Solicitor))
            .unwrap();
        assert_eq!(user.role, Role::Solicitor);
        assert_eq!(store.authenticate("ann", "password1").unwrap().map(|u| u.id), Some(user.id));
        assert!(store.authenticate("ann", "nope").unwrap().is_none());
        assert!(store.authenticate("bob", "password1").unwrap().is_none());
    }

    #[test]
    fn missing_user_is_not_found() {
        let store = Store::open().unwrap();
        assert!(store.get_user(42).unwrap_err().is_not_found());
    }
}
