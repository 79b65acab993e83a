//! Backup export and restore for family records.
//!
//! # Responsibility
//! - Render the family list as a JSON backup document or a flat CSV sheet.
//! - Restore a JSON backup by replacing the whole family collection.
//! - Track when the last backup was taken.
//!
//! # Invariants
//! - Exports never run against an empty collection.
//! - Restore validates the whole document before touching storage; a
//!   malformed backup leaves existing data as it was.
//! - Restored records keep their ids and timestamps.

use crate::clock::{date_stamp, to_iso8601, Clock};
use crate::model::family::FamilyRecord;
use crate::model::session::Session;
use crate::repo::{RepoError, Repository};
use crate::store::{keys, LocalStore, StoreError};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const FILE_STEM: &str = "family-data-backup";

#[derive(Debug)]
pub enum BackupError {
    NoData,
    /// Only admins may export or restore.
    Forbidden,
    InvalidFormat(String),
    Serialize(serde_json::Error),
    Repo(RepoError),
    Store(StoreError),
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoData => write!(f, "No data to backup"),
            Self::Forbidden => write!(f, "only an admin can back up or restore data"),
            Self::InvalidFormat(details) => write!(f, "Invalid backup file format: {details}"),
            Self::Serialize(err) => write!(f, "backup serialization failed: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialize(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for BackupError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<StoreError> for BackupError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// JSON backup envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub export_date: String,
    pub exported_by: String,
    pub total_records: usize,
    pub data: Vec<FamilyRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFormat {
    Json,
    Csv,
}

impl BackupFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Rendered backup ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub file_name: String,
    pub contents: String,
}

pub struct BackupService<'conn> {
    store: LocalStore<'conn>,
    clock: Arc<dyn Clock>,
}

impl<'conn> BackupService<'conn> {
    pub fn new(store: LocalStore<'conn>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// `family-data-backup-YYYY-MM-DD.<ext>` for the current UTC day.
    pub fn file_name(&self, format: BackupFormat) -> String {
        format!(
            "{FILE_STEM}-{}.{}",
            date_stamp(self.clock.now_ms()),
            format.extension()
        )
    }

    pub fn export(
        &self,
        format: BackupFormat,
        families: &[FamilyRecord],
        actor: &Session,
    ) -> Result<BackupFile, BackupError> {
        if !actor.is_admin() {
            return Err(BackupError::Forbidden);
        }
        if families.is_empty() {
            info!(
                "event=backup_export module=backup status=error format={} reason=no_data",
                format.extension()
            );
            return Err(BackupError::NoData);
        }

        let contents = match format {
            BackupFormat::Json => self.render_json(families, &actor.username)?,
            BackupFormat::Csv => render_csv(families)?,
        };
        self.store
            .set_item(keys::LAST_BACKUP, &self.clock.now_ms().to_string())?;
        info!(
            "event=backup_export module=backup status=ok format={} records={}",
            format.extension(),
            families.len()
        );
        Ok(BackupFile {
            file_name: self.file_name(format),
            contents,
        })
    }

    /// JSON followed by CSV, as a single action.
    pub fn export_both(
        &self,
        families: &[FamilyRecord],
        actor: &Session,
    ) -> Result<[BackupFile; 2], BackupError> {
        Ok([
            self.export(BackupFormat::Json, families, actor)?,
            self.export(BackupFormat::Csv, families, actor)?,
        ])
    }

    /// Replaces the family collection with the records in `text`.
    ///
    /// The whole document is parsed before storage is touched. On the hosted
    /// backend the write itself is not atomic; see `RemoteRepository::replace_all`.
    ///
    /// Returns the number of restored records.
    pub fn restore<R: Repository<FamilyRecord>>(
        &self,
        repo: &R,
        text: &str,
        actor: &Session,
    ) -> Result<usize, BackupError> {
        if !actor.is_admin() {
            return Err(BackupError::Forbidden);
        }
        let records = parse_backup(text).map_err(|err| {
            warn!("event=backup_restore module=backup status=error error={err}");
            err
        })?;

        repo.replace_all(&records).map_err(|err| {
            error!("event=backup_restore module=backup status=error stage=write error={err}");
            BackupError::from(err)
        })?;
        info!(
            "event=backup_restore module=backup status=ok records={} backend={}",
            records.len(),
            repo.backend().as_str()
        );
        Ok(records.len())
    }

    /// Epoch milliseconds of the last successful export.
    pub fn last_backup_at(&self) -> Result<Option<i64>, BackupError> {
        let Some(raw) = self.store.get_item(keys::LAST_BACKUP)? else {
            return Ok(None);
        };
        match raw.trim().parse::<i64>() {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                warn!("event=backup_status module=backup status=error reason=unparseable_last_backup");
                Ok(None)
            }
        }
    }

    fn render_json(&self, families: &[FamilyRecord], exported_by: &str) -> Result<String, BackupError> {
        let document = BackupDocument {
            export_date: to_iso8601(self.clock.now_ms()),
            exported_by: exported_by.to_string(),
            total_records: families.len(),
            data: families.to_vec(),
        };
        serde_json::to_string_pretty(&document).map_err(BackupError::Serialize)
    }
}

/// Parses and validates a JSON backup without side effects.
pub fn parse_backup(text: &str) -> Result<Vec<FamilyRecord>, BackupError> {
    let mut value: Value = serde_json::from_str(text)
        .map_err(|err| BackupError::InvalidFormat(format!("not valid JSON: {err}")))?;
    let data = match value.get_mut("data") {
        Some(Value::Array(items)) => std::mem::take(items),
        _ => {
            return Err(BackupError::InvalidFormat(
                "missing `data` array".to_string(),
            ))
        }
    };

    data.into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<FamilyRecord>(item).map_err(|err| {
                BackupError::InvalidFormat(format!("record {index} is malformed: {err}"))
            })
        })
        .collect()
}

/// Flat CSV: header from the first record, every value quoted.
pub fn render_csv(families: &[FamilyRecord]) -> Result<String, BackupError> {
    let rows = families
        .iter()
        .map(|family| {
            let mut row = Vec::new();
            match serde_json::to_value(family).map_err(BackupError::Serialize)? {
                Value::Object(map) => flatten("", &map, &mut row),
                _ => {
                    return Err(BackupError::InvalidFormat(
                        "family did not serialize to an object".to_string(),
                    ))
                }
            }
            Ok(row)
        })
        .collect::<Result<Vec<_>, BackupError>>()?;

    let Some(first) = rows.first() else {
        return Err(BackupError::NoData);
    };
    let headers = first.iter().map(|(key, _)| key.clone()).collect::<Vec<_>>();

    let mut lines = vec![headers.join(",")];
    for row in &rows {
        let values = headers
            .iter()
            .map(|header| {
                let cell = row
                    .iter()
                    .find(|(key, _)| key == header)
                    .map_or("", |(_, value)| value.as_str());
                quote(cell)
            })
            .collect::<Vec<_>>();
        lines.push(values.join(","));
    }
    Ok(lines.join("\n"))
}

fn flatten(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten(&path, nested, out),
            Value::Null => out.push((path, String::new())),
            Value::String(text) => out.push((path, text.clone())),
            Value::Bool(_) | Value::Number(_) | Value::Array(_) => {
                out.push((path, value.to_string()))
            }
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::{parse_backup, quote, render_csv, BackupError};
    use crate::model::family::{FamilyDraft, FamilyInfo, FamilyRecord};
    use crate::model::Entity;

    fn record(name: &str) -> FamilyRecord {
        FamilyRecord::from_draft(
            "FAM1".to_string(),
            FamilyDraft::new(FamilyInfo {
                family_name: name.to_string(),
                address: "5 Main St".to_string(),
                contact_number: "0770000000".to_string(),
                number_of_members: 2,
                ..FamilyInfo::default()
            }),
            1_700_000_000_000,
        )
    }

    #[test]
    fn quote_doubles_inner_quotes() {
        assert_eq!(quote(r#"the "Silva" home"#), r#""the ""Silva"" home""#);
    }

    #[test]
    fn csv_flattens_nested_info_with_dotted_headers() {
        let csv = render_csv(&[record("Silva")]).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("familyInfo.familyName"));
        assert!(header.contains("members"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"Silva\""));
        assert!(row.contains("\"[]\""));
        assert!(row.contains("\"1700000000000\""));
    }

    #[test]
    fn parse_rejects_missing_data_array() {
        assert!(matches!(
            parse_backup(r#"{"exportDate":"x","totalRecords":0}"#),
            Err(BackupError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_backup(r#"{"data":{}}"#),
            Err(BackupError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_backup("not json"),
            Err(BackupError::InvalidFormat(_))
        ));
    }

    #[test]
    fn parse_keeps_ids() {
        let text = serde_json::json!({ "data": [record("Silva")] }).to_string();
        let records = parse_backup(&text).unwrap();
        assert_eq!(records[0].id, "FAM1");
    }
}
