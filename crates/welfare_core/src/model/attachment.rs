//! Stored file attachment owned by a family record.
//!
//! # Invariants
//! - `id` is assigned by the attachment store and strictly increases.
//! - Attachments are created and deleted, never updated.

use serde::{Deserialize, Serialize};

pub type FileId = i64;

/// Upload input. `data` is the raw file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub family_id: String,
    pub file_name: String,
    pub file_type: String,
    pub data: Vec<u8>,
}

/// Full stored attachment including encoded content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: FileId,
    pub family_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    /// `data:<mime>;base64,<payload>` URL.
    pub file_data: String,
    /// RFC 3339 upload timestamp.
    pub upload_date: String,
    pub uploaded_by: String,
}

/// Metadata returned after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: FileId,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub upload_date: String,
}

impl From<&StoredFile> for FileSummary {
    fn from(file: &StoredFile) -> Self {
        Self {
            id: file.id,
            file_name: file.file_name.clone(),
            file_type: file.file_type.clone(),
            file_size: file.file_size,
            upload_date: file.upload_date.clone(),
        }
    }
}

/// Aggregate attachment store usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageUsage {
    pub total_files: u64,
    pub total_size: u64,
}
