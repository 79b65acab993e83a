//! Attachment repository over the `family_files` table.
//!
//! # Invariants
//! - File ids come from SQLite `AUTOINCREMENT` and are never reused.
//! - Listing by family returns files in id order.

use super::{RepoError, RepoResult};
use crate::model::attachment::{FileId, StorageUsage, StoredFile};
use rusqlite::{params, Connection, OptionalExtension, Row};

const FILE_SELECT_SQL: &str = "SELECT
    id,
    family_id,
    file_name,
    file_type,
    file_size,
    file_data,
    upload_date,
    uploaded_by
FROM family_files";

/// New row payload; `id` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRow {
    pub family_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub file_data: String,
    pub upload_date: String,
    pub uploaded_by: String,
}

pub trait AttachmentRepository {
    fn insert_file(&self, row: &AttachmentRow) -> RepoResult<FileId>;
    fn get_file(&self, id: FileId) -> RepoResult<Option<StoredFile>>;
    fn list_for_family(&self, family_id: &str) -> RepoResult<Vec<StoredFile>>;
    fn delete_file(&self, id: FileId) -> RepoResult<()>;
    fn usage(&self) -> RepoResult<StorageUsage>;
}

pub struct SqliteAttachmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttachmentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AttachmentRepository for SqliteAttachmentRepository<'_> {
    fn insert_file(&self, row: &AttachmentRow) -> RepoResult<FileId> {
        self.conn.execute(
            "INSERT INTO family_files (
                family_id,
                file_name,
                file_type,
                file_size,
                file_data,
                upload_date,
                uploaded_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                row.family_id.as_str(),
                row.file_name.as_str(),
                row.file_type.as_str(),
                size_to_db(row.file_size)?,
                row.file_data.as_str(),
                row.upload_date.as_str(),
                row.uploaded_by.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_file(&self, id: FileId) -> RepoResult<Option<StoredFile>> {
        let row = self
            .conn
            .query_row(
                &format!("{FILE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_file_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    fn list_for_family(&self, family_id: &str) -> RepoResult<Vec<StoredFile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{FILE_SELECT_SQL} WHERE family_id = ?1 ORDER BY id ASC;"))?;
        let mut rows = stmt.query([family_id])?;
        let mut files = Vec::new();
        while let Some(row) = rows.next()? {
            files.push(parse_file_row(row)?);
        }
        Ok(files)
    }

    fn delete_file(&self, id: FileId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM family_files WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: "file",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn usage(&self) -> RepoResult<StorageUsage> {
        let (count, total): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0) FROM family_files;",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(StorageUsage {
            total_files: size_from_db(count, "COUNT(*)")?,
            total_size: size_from_db(total, "SUM(file_size)")?,
        })
    }
}

fn parse_file_row(row: &Row<'_>) -> RepoResult<StoredFile> {
    let size: i64 = row.get("file_size")?;
    Ok(StoredFile {
        id: row.get("id")?,
        family_id: row.get("family_id")?,
        file_name: row.get("file_name")?,
        file_type: row.get("file_type")?,
        file_size: size_from_db(size, "family_files.file_size")?,
        file_data: row.get("file_data")?,
        upload_date: row.get("upload_date")?,
        uploaded_by: row.get("uploaded_by")?,
    })
}

fn size_to_db(size: u64) -> RepoResult<i64> {
    i64::try_from(size)
        .map_err(|_| RepoError::InvalidData(format!("file size {size} exceeds storage range")))
}

fn size_from_db(value: i64, column: &str) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative value `{value}` in {column}")))
}
