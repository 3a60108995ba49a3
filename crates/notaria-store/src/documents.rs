//! Document metadata. File bytes live in [`Media`].

use duckdb::{OptionalExt, Row, ToSql, params};
use notaria_core::{Document, DocumentEdit, DocumentStatus, NewDocument};
use serde_json::Value;
use tracing::info;

use crate::media::Media;
use crate::store::{fmt_json, fmt_ts, opt_json, parsed, ts};
use crate::{Scope, Store, StoreError};

const COLUMNS: &str = "id, uploaded_by, file, name, file_type, file_size, upload_date, client_id, \
                       matter_id, summary, segmentation_result, status";

fn read_document(row: &Row<'_>) -> duckdb::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        uploaded_by: row.get(1)?,
        file: row.get(2)?,
        name: row.get(3)?,
        file_type: row.get(4)?,
        file_size: row.get(5)?,
        upload_date: ts(row, 6)?,
        client_id: row.get(7)?,
        matter_id: row.get(8)?,
        summary: row.get(9)?,
        segmentation_result: opt_json(row, 10)?,
        status: parsed(row, 11)?,
    })
}

impl Store {
    pub fn create_document(&self, doc: &NewDocument) -> Result<Document, StoreError> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO documents (uploaded_by, file, name, file_type, file_size, upload_date, \
             client_id, matter_id, status) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            params![
                doc.uploaded_by,
                doc.file,
                doc.name,
                doc.file_type,
                doc.file_size,
                fmt_ts(notaria_core::now()),
                doc.client_id,
                doc.matter_id,
                DocumentStatus::Uploaded.as_str(),
            ],
            |row| row.get(0),
        )?;
        info!(document_id = id, file = %doc.file, size = doc.file_size, "created document");
        self.get_document(id)
    }

    pub fn get_document(&self, id: i64) -> Result<Document, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM documents WHERE id = ?"),
                [id],
                read_document,
            )
            .optional()?
            .ok_or(StoreError::not_found("document", id))
    }

    /// Documents visible in `scope`, optionally only those of one matter.
    pub fn list_documents(&self, scope: Scope, matter_id: Option<i64>) -> Result<Vec<Document>, StoreError> {
        let mut clauses = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();
        let owner = match scope {
            Scope::Owner(uid) => Some(uid),
            Scope::All => None,
        };
        if let Some(uid) = &owner {
            clauses.push("uploaded_by = ?");
            params.push(uid);
        }
        if let Some(mid) = &matter_id {
            clauses.push("matter_id = ?");
            params.push(mid);
        }
        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        self.query_list(
            &format!("SELECT {COLUMNS} FROM documents {filter} ORDER BY upload_date DESC, id DESC"),
            &params,
            read_document,
        )
    }

    pub fn update_document(&self, id: i64, edit: &DocumentEdit) -> Result<Document, StoreError> {
        let changed = self.conn.execute(
            "UPDATE documents SET name = ?, client_id = ?, matter_id = ?, status = ? WHERE id = ?",
            params![edit.name, edit.client_id, edit.matter_id, edit.status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("document", id));
        }
        self.get_document(id)
    }

    pub fn set_document_status(&self, id: i64, status: DocumentStatus) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE documents SET status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("document", id));
        }
        Ok(())
    }

    pub fn set_document_summary(&self, id: i64, summary: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE documents SET summary = ?, status = ? WHERE id = ?",
            params![summary, DocumentStatus::Processed.as_str(), id],
        )?;
        info!(document_id = id, chars = summary.len(), "stored summary");
        Ok(())
    }

    pub fn set_document_segmentation(&self, id: i64, result: &Value) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE documents SET segmentation_result = ?, status = ? WHERE id = ?",
            params![fmt_json(result), DocumentStatus::Processed.as_str(), id],
        )?;
        info!(document_id = id, "stored segmentation");
        Ok(())
    }

    /// Remove the stored file, then the row.
    pub fn delete_document(&self, id: i64, media: &Media) -> Result<(), StoreError> {
        let doc = self.get_document(id)?;
        media.remove(&doc.file)?;
        self.conn.execute("DELETE FROM documents WHERE id = ?", [id])?;
        info!(document_id = id, file = %doc.file, "deleted document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use notaria_core::Role;
    use tempfile::TempDir;

    use crate::testing::user;

    fn upload(store: &Store, media: &Media, by: i64, matter_id: Option<i64>) -> Document {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let (file, size) = media.save_document("deed.txt", b"This deed witnesses", day).unwrap();
        store
            .create_document(&NewDocument {
                uploaded_by: by,
                file,
                name: "Deed".into(),
                file_type: "text/plain".into(),
                file_size: size,
                client_id: None,
                matter_id,
            })
            .unwrap()
    }

    #[test]
    fn delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let media = Media::new(dir.path());
        let store = Store::open().unwrap();
        let doc = upload(&store, &media, 1, None);
        assert!(media.exists(&doc.file));

        store.delete_document(doc.id, &media).unwrap();
        assert!(!media.exists(&doc.file));
        assert!(store.get_document(doc.id).unwrap_err().is_not_found());
    }

    #[test]
    fn list_filters_by_owner_and_matter() {
        let dir = TempDir::new().unwrap();
        let media = Media::new(dir.path());
        let store = Store::open().unwrap();
        upload(&store, &media, 1, Some(5));
        upload(&store, &media, 1, None);
        upload(&store, &media, 2, Some(5));

        assert_eq!(store.list_documents(Scope::All, None).unwrap().len(), 3);
        assert_eq!(store.list_documents(Scope::All, Some(5)).unwrap().len(), 2);
        assert_eq!(store.list_documents(Scope::Owner(1), None).unwrap().len(), 2);
        assert_eq!(store.list_documents(Scope::Owner(1), Some(5)).unwrap().len(), 1);
    }

    #[test]
    fn processing_results_are_stored() {
        let dir = TempDir::new().unwrap();
        let media = Media::new(dir.path());
        let store = Store::open().unwrap();
        let doc = upload(&store, &media, 1, None);

        store.set_document_status(doc.id, DocumentStatus::Processing).unwrap();
        store.set_document_summary(doc.id, "A deed.").unwrap();
        let seg = serde_json::json!(["Recitals", "Operative part"]);
        store.set_document_segmentation(doc.id, &seg).unwrap();

        let doc = store.get_document(doc.id).unwrap();
        assert_eq!(doc.status, DocumentStatus::Processed);
        assert_eq!(doc.summary.as_deref(), Some("A deed."));
        assert_eq!(doc.segmentation_result, Some(seg));
    }

    #[test]
    fn deleting_uploader_removes_their_documents() {
        let dir = TempDir::new().unwrap();
        let media = Media::new(dir.path());
        let mut store = Store::open().unwrap();
        let owner = user(&store, "ann", Role::Notary);
        let doc = upload(&store, &media, owner.id, None);

        store.delete_user(owner.id, &media).unwrap();
        assert!(!media.exists(&doc.file));
        assert!(store.list_documents(Scope::All, None).unwrap().is_empty());
    }
}
