//! Family welfare record.
//!
//! # Responsibility
//! - Define the household profile: family info block, household members,
//!   special categories, status and audit fields.
//! - Validate family info before it reaches storage.
//!
//! # Invariants
//! - `id` is assigned at creation and never changes, including on undo.
//! - `members` and `special_categories` keep insertion order only.
//! - `number_of_members` is at least 1 for every valid record.

use super::{contains_ci, is_valid_email, Entity};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type FamilyId = String;

const CONTACT_NUMBER_DIGITS: usize = 10;

/// Record lifecycle flag shown on dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyStatus {
    #[default]
    Active,
    Inactive,
}

impl FamilyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Core household details captured by the data-entry form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyInfo {
    pub family_name: String,
    pub address: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    pub contact_number: String,
    #[serde(default)]
    pub email: String,
    /// National identity card number of the head of household.
    #[serde(default)]
    pub nic: String,
    #[serde(default)]
    pub owns_house: bool,
    #[serde(default)]
    pub owns_land: bool,
    #[serde(default)]
    pub eligible_for_aid: bool,
    pub number_of_members: u32,
}

/// One person living in the household.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HouseholdMember {
    pub name: String,
    pub relationship: String,
    /// `YYYY-MM-DD` as entered.
    pub date_of_birth: Option<String>,
    pub gender: Option<Gender>,
    pub nic: String,
    pub occupation: String,
    pub contact_number: String,
}

/// Welfare category the household falls under (disability, elderly care, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecialCategory {
    pub category: String,
    pub description: String,
}

/// Persisted family record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyRecord {
    pub id: FamilyId,
    pub family_info: FamilyInfo,
    #[serde(default)]
    pub members: Vec<HouseholdMember>,
    #[serde(default)]
    pub special_categories: Vec<SpecialCategory>,
    #[serde(default)]
    pub status: FamilyStatus,
    #[serde(default)]
    pub notes: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
}

/// Creation input for a family record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FamilyDraft {
    pub family_info: FamilyInfo,
    pub members: Vec<HouseholdMember>,
    pub special_categories: Vec<SpecialCategory>,
    pub status: FamilyStatus,
    pub notes: String,
    pub last_modified_by: Option<String>,
}

impl FamilyDraft {
    /// Creates an active draft with no members or categories.
    pub fn new(family_info: FamilyInfo) -> Self {
        Self {
            family_info,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), FamilyValidationError> {
        self.family_info.validate()
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FamilyPatch {
    pub family_info: Option<FamilyInfo>,
    pub members: Option<Vec<HouseholdMember>>,
    pub special_categories: Option<Vec<SpecialCategory>>,
    pub status: Option<FamilyStatus>,
    pub notes: Option<String>,
    pub last_modified_by: Option<String>,
}

impl FamilyPatch {
    pub fn status(status: FamilyStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// One failed family field rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyValidationIssue {
    MissingFamilyName,
    MissingContactNumber,
    MalformedContactNumber,
    MalformedEmail,
    MissingAddress,
    TooFewMembers,
}

impl FamilyValidationIssue {
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingFamilyName => "Family name is required",
            Self::MissingContactNumber => "Contact number is required",
            Self::MalformedContactNumber => "Contact number must be 10 digits",
            Self::MalformedEmail => "Invalid email format",
            Self::MissingAddress => "Address is required",
            Self::TooFewMembers => "Number of members must be at least 1",
        }
    }
}

/// All rules a family info block failed, in form order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyValidationError {
    pub issues: Vec<FamilyValidationIssue>,
}

impl FamilyValidationError {
    pub fn first_message(&self) -> &'static str {
        self.issues
            .first()
            .map_or("invalid family record", |issue| issue.message())
    }
}

impl Display for FamilyValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let messages = self
            .issues
            .iter()
            .map(|issue| issue.message())
            .collect::<Vec<_>>();
        write!(f, "{}", messages.join("; "))
    }
}

impl Error for FamilyValidationError {}

impl FamilyInfo {
    /// Checks required fields and formats, collecting every failure.
    pub fn validate(&self) -> Result<(), FamilyValidationError> {
        let mut issues = Vec::new();

        if self.family_name.trim().is_empty() {
            issues.push(FamilyValidationIssue::MissingFamilyName);
        }

        if self.contact_number.trim().is_empty() {
            issues.push(FamilyValidationIssue::MissingContactNumber);
        } else if !is_valid_contact_number(&self.contact_number) {
            issues.push(FamilyValidationIssue::MalformedContactNumber);
        }

        if !self.email.trim().is_empty() && !is_valid_email(self.email.trim()) {
            issues.push(FamilyValidationIssue::MalformedEmail);
        }

        if self.address.trim().is_empty() {
            issues.push(FamilyValidationIssue::MissingAddress);
        }

        if self.number_of_members < 1 {
            issues.push(FamilyValidationIssue::TooFewMembers);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(FamilyValidationError { issues })
        }
    }
}

/// Exactly ten digits once spaces and dashes are removed.
pub fn is_valid_contact_number(value: &str) -> bool {
    let digits = value
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '-')
        .collect::<String>();
    digits.len() == CONTACT_NUMBER_DIGITS && digits.chars().all(|ch| ch.is_ascii_digit())
}

impl FamilyRecord {
    pub fn is_active(&self) -> bool {
        self.status == FamilyStatus::Active
    }
}

impl Entity for FamilyRecord {
    type Draft = FamilyDraft;
    type Patch = FamilyPatch;

    const KIND: &'static str = "family";
    const LOCAL_KEY: &'static str = "familiesData";
    const COLLECTION: &'static str = "families";
    const ID_PREFIX: &'static str = "FAM";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn from_draft(id: String, draft: FamilyDraft, now_ms: i64) -> Self {
        Self {
            id,
            family_info: draft.family_info,
            members: draft.members,
            special_categories: draft.special_categories,
            status: draft.status,
            notes: draft.notes,
            created_at: now_ms,
            updated_at: now_ms,
            last_modified_by: draft.last_modified_by,
        }
    }

    fn apply_patch(&mut self, patch: &FamilyPatch, now_ms: i64) {
        if let Some(info) = &patch.family_info {
            self.family_info = info.clone();
        }
        if let Some(members) = &patch.members {
            self.members = members.clone();
        }
        if let Some(categories) = &patch.special_categories {
            self.special_categories = categories.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(modified_by) = &patch.last_modified_by {
            self.last_modified_by = Some(modified_by.clone());
        }
        self.updated_at = now_ms;
    }

    fn matches(&self, needle: &str) -> bool {
        let info = &self.family_info;
        contains_ci(&info.family_name, needle)
            || info.contact_number.contains(needle)
            || contains_ci(&info.email, needle)
            || contains_ci(&info.address, needle)
            || contains_ci(&info.area, needle)
            || contains_ci(&info.city, needle)
    }
}
