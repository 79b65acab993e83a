//! Family attachments and the trusted-device gate.
//!
//! # Responsibility
//! - Store uploaded files as base64 data URLs in the attachment store.
//! - Allow uploads and deletions only from the `admin` user on a device
//!   marked as trusted.
//!
//! # Invariants
//! - Listing and reading never require the trusted device.
//! - File content is never logged; events carry ids and sizes only.

use crate::clock::{to_iso8601, Clock};
use crate::model::attachment::{FileId, FileSummary, NewAttachment, StorageUsage, StoredFile};
use crate::model::session::Session;
use crate::model::user::UserRole;
use crate::repo::{AttachmentRepository, AttachmentRow, RepoError};
use crate::store::{keys, LocalStore, StoreError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Only this account, holding the admin role, may change attachments.
const ATTACHMENT_ADMIN: &str = "admin";
const TRUSTED_FLAG_VALUE: &str = "true";

#[derive(Debug)]
pub enum AttachmentError {
    NotPermitted,
    NotFound(FileId),
    Repo(RepoError),
    Store(StoreError),
}

impl Display for AttachmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPermitted => write!(
                f,
                "attachments can only be changed by the admin account on the trusted device"
            ),
            Self::NotFound(id) => write!(f, "file not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AttachmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AttachmentError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<StoreError> for AttachmentError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Trusted-device flag kept in the local store.
#[derive(Clone, Copy)]
pub struct DeviceTrust<'conn> {
    store: LocalStore<'conn>,
}

impl<'conn> DeviceTrust<'conn> {
    pub fn new(store: LocalStore<'conn>) -> Self {
        Self { store }
    }

    pub fn is_trusted(&self) -> Result<bool, StoreError> {
        Ok(self.store.get_item(keys::TRUSTED_DEVICE)?.as_deref() == Some(TRUSTED_FLAG_VALUE))
    }

    pub fn mark_trusted(&self, now_ms: i64) -> Result<(), StoreError> {
        self.store.set_item(keys::TRUSTED_DEVICE, TRUSTED_FLAG_VALUE)?;
        self.store
            .set_item(keys::TRUSTED_DEVICE_SET_AT, &now_ms.to_string())?;
        info!("event=device_trust module=attachment status=ok trusted=true");
        Ok(())
    }

    pub fn revoke(&self) -> Result<(), StoreError> {
        self.store.remove_item(keys::TRUSTED_DEVICE)?;
        self.store.remove_item(keys::TRUSTED_DEVICE_SET_AT)?;
        info!("event=device_trust module=attachment status=ok trusted=false");
        Ok(())
    }

    /// Epoch ms at which the device was marked trusted.
    pub fn trusted_since(&self) -> Result<Option<i64>, StoreError> {
        Ok(self
            .store
            .get_item(keys::TRUSTED_DEVICE_SET_AT)?
            .and_then(|raw| raw.trim().parse().ok()))
    }

    pub fn can_modify(&self, session: Option<&Session>) -> Result<bool, StoreError> {
        let is_admin_user = session.is_some_and(|session| {
            session.username == ATTACHMENT_ADMIN && session.role == UserRole::Admin
        });
        Ok(is_admin_user && self.is_trusted()?)
    }
}

pub struct AttachmentService<'conn, A: AttachmentRepository> {
    repo: A,
    trust: DeviceTrust<'conn>,
    clock: Arc<dyn Clock>,
}

impl<'conn, A: AttachmentRepository> AttachmentService<'conn, A> {
    pub fn new(repo: A, trust: DeviceTrust<'conn>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, trust, clock }
    }

    pub fn device(&self) -> &DeviceTrust<'conn> {
        &self.trust
    }

    pub fn store(
        &self,
        session: Option<&Session>,
        upload: NewAttachment,
    ) -> Result<FileSummary, AttachmentError> {
        self.ensure_can_modify(session)?;
        let uploaded_by = session.map_or(ATTACHMENT_ADMIN, |session| session.username.as_str());

        let row = AttachmentRow {
            file_size: upload.data.len() as u64,
            file_data: to_data_url(&upload.file_type, &upload.data),
            family_id: upload.family_id,
            file_name: upload.file_name,
            file_type: upload.file_type,
            upload_date: to_iso8601(self.clock.now_ms()),
            uploaded_by: uploaded_by.to_string(),
        };
        let id = self.repo.insert_file(&row).map_err(|err| {
            error!("event=file_store module=attachment status=error error={err}");
            AttachmentError::from(err)
        })?;
        info!(
            "event=file_store module=attachment status=ok id={id} family_id={} size={}",
            row.family_id, row.file_size
        );

        Ok(FileSummary {
            id,
            file_name: row.file_name,
            file_type: row.file_type,
            file_size: row.file_size,
            upload_date: row.upload_date,
        })
    }

    pub fn list_for_family(&self, family_id: &str) -> Result<Vec<StoredFile>, AttachmentError> {
        Ok(self.repo.list_for_family(family_id)?)
    }

    pub fn get(&self, id: FileId) -> Result<StoredFile, AttachmentError> {
        self.repo
            .get_file(id)?
            .ok_or(AttachmentError::NotFound(id))
    }

    pub fn delete(&self, session: Option<&Session>, id: FileId) -> Result<(), AttachmentError> {
        self.ensure_can_modify(session)?;
        self.repo.delete_file(id).map_err(|err| match err {
            RepoError::NotFound { .. } => AttachmentError::NotFound(id),
            other => AttachmentError::Repo(other),
        })?;
        info!("event=file_delete module=attachment status=ok id={id}");
        Ok(())
    }

    pub fn usage(&self) -> Result<StorageUsage, AttachmentError> {
        Ok(self.repo.usage()?)
    }

    fn ensure_can_modify(&self, session: Option<&Session>) -> Result<(), AttachmentError> {
        if self.trust.can_modify(session)? {
            Ok(())
        } else {
            info!("event=file_guard module=attachment status=error reason=not_permitted");
            Err(AttachmentError::NotPermitted)
        }
    }
}

/// `data:<mime>;base64,<payload>`.
pub fn to_data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(data))
}

/// Decodes the payload of a base64 data URL.
pub fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let (_, payload) = url.split_once(";base64,")?;
    STANDARD.decode(payload).ok()
}
