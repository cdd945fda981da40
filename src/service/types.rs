use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::engine::status::Status;

/// Answer codes shorter than this are placeholder codes, not real
/// assigned identifiers.
const SUBSTANTIAL_CODE_LEN: usize = 5;

/// One requirement slot on a resource. `PrimaryAssign` and `PrimaryUpload`
/// must be answered with an assigned identifier; `SecondaryNote` with a
/// filled label/value pair. Unrecognized wire codes map to `Other` and are
/// ignored by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequirementCode {
    PrimaryAssign,
    PrimaryUpload,
    SecondaryNote,
    Other,
}

impl RequirementCode {
    pub fn is_primary(self) -> bool {
        matches!(self, Self::PrimaryAssign | Self::PrimaryUpload)
    }

    pub fn is_secondary(self) -> bool {
        matches!(self, Self::SecondaryNote)
    }
}

impl From<String> for RequirementCode {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "primary_assign" => Self::PrimaryAssign,
            "primary_upload" => Self::PrimaryUpload,
            "secondary_note" => Self::SecondaryNote,
            _ => Self::Other,
        }
    }
}

impl From<RequirementCode> for String {
    fn from(code: RequirementCode) -> Self {
        match code {
            RequirementCode::PrimaryAssign => "primary_assign".to_string(),
            RequirementCode::PrimaryUpload => "primary_upload".to_string(),
            RequirementCode::SecondaryNote => "secondary_note".to_string(),
            RequirementCode::Other => "other".to_string(),
        }
    }
}

/// The requirement specification an item is evaluated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub requirements: Vec<RequirementCode>,
}

/// A numeric answer entry, tagged at ingestion so classification never
/// re-derives the length heuristic. Wire form is the bare code string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerCode {
    pub code: String,
    pub is_substantial: bool,
}

impl AnswerCode {
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        let is_substantial = code.len() > SUBSTANTIAL_CODE_LEN;
        Self {
            code,
            is_substantial,
        }
    }
}

impl<'de> Deserialize<'de> for AnswerCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(AnswerCode::new(code))
    }
}

impl Serialize for AnswerCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code)
    }
}

/// A label/value pair from the response. Wire form is a string array;
/// missing elements default to empty, so classification degrades instead
/// of erroring on short rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPair {
    pub label: String,
    pub value: String,
}

impl FieldPair {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    pub fn is_filled(&self) -> bool {
        !self.value.is_empty()
    }
}

impl<'de> Deserialize<'de> for FieldPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut parts = Vec::<String>::deserialize(deserializer)?;
        let value = if parts.len() > 1 {
            parts.remove(1)
        } else {
            String::new()
        };
        let label = parts.into_iter().next().unwrap_or_default();
        Ok(FieldPair { label, value })
    }
}

impl Serialize for FieldPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.label)?;
        seq.serialize_element(&self.value)?;
        seq.end()
    }
}

/// The user's submitted answer data for an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(default)]
    pub answers: Vec<AnswerCode>,
    #[serde(default)]
    pub fields: Vec<FieldPair>,
}

/// Resource reference on an item: either the populated spec or a bare
/// identifier. The clone endpoint returns bare identifiers; reconciliation
/// replaces them before an item enters the feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Full(ResourceSpec),
    Id(String),
}

impl ResourceRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Full(spec) => &spec.id,
            Self::Id(id) => id,
        }
    }

    pub fn as_full(&self) -> Option<&ResourceSpec> {
        match self {
            Self::Full(spec) => Some(spec),
            Self::Id(_) => None,
        }
    }
}

/// Owning-program summary as returned by the list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Program reference on an item. Clone stamping sets a bare id; listed
/// items carry the summary so the aggregate view can sort by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgramRef {
    Full(ProgramSummary),
    Id(String),
}

impl ProgramRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Full(summary) => &summary.id,
            Self::Id(id) => id,
        }
    }

    /// Display name used as the aggregate-mode sort key. Bare references
    /// sort as empty.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Full(summary) => &summary.name,
            Self::Id(_) => "",
        }
    }
}

/// Reminder settings on a calendar entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReminderOptions {
    #[serde(default)]
    pub first_reminder_minutes: u32,
    #[serde(default)]
    pub second_reminder_minutes: u32,
    #[serde(default)]
    pub reminders: Vec<DateTime<Utc>>,
}

/// Scheduling metadata, only meaningful for cloned items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub notes: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub options: ReminderOptions,
}

impl CalendarEntry {
    /// Fresh defaults for a clone target: title from the item's display
    /// name, start/end at the current time, no reminders.
    pub fn fresh(title: &str) -> Self {
        let now = Utc::now();
        Self {
            title: title.to_string(),
            location: String::new(),
            notes: String::new(),
            start_date: now,
            end_date: now,
            options: ReminderOptions::default(),
        }
    }
}

/// Role-type of the viewer, doubling as the index into an item's
/// applicability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleType {
    Participant = 2,
    Organizer = 3,
    Leader = 4,
}

impl RoleType {
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            2 => Some(Self::Participant),
            3 => Some(Self::Organizer),
            4 => Some(Self::Leader),
            _ => None,
        }
    }

    pub fn flag_index(self) -> usize {
        self as usize
    }
}

/// One onboarding activity instance tracked for a user or program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceItem {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub program: ProgramRef,
    pub resource: ResourceRef,
    #[serde(default)]
    pub response: Option<ResponseData>,
    #[serde(default)]
    pub applicability: Vec<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar: Option<CalendarEntry>,
    /// Derived locally from (response, resource); never trusted from the wire.
    #[serde(skip)]
    pub status: Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_code_tagging() {
        assert!(AnswerCode::new("5f8d0c2e1a").is_substantial);
        assert!(!AnswerCode::new("40000").is_substantial);
        assert!(!AnswerCode::new("").is_substantial);
    }

    #[test]
    fn test_requirement_code_wire_round_trip() {
        let codes: Vec<RequirementCode> =
            serde_json::from_str(r#"["primary_assign","secondary_note","bogus"]"#).unwrap();
        assert_eq!(
            codes,
            vec![
                RequirementCode::PrimaryAssign,
                RequirementCode::SecondaryNote,
                RequirementCode::Other
            ]
        );
        assert!(codes[0].is_primary());
        assert!(codes[1].is_secondary());
        assert!(!codes[2].is_primary() && !codes[2].is_secondary());
    }

    #[test]
    fn test_field_pair_short_rows_default_empty() {
        let pairs: Vec<FieldPair> =
            serde_json::from_str(r#"[["Emergency contact","Jo"],["Shirt size"],[]]"#).unwrap();
        assert!(pairs[0].is_filled());
        assert_eq!(pairs[1].label, "Shirt size");
        assert!(!pairs[1].is_filled());
        assert_eq!(pairs[2].label, "");
    }

    #[test]
    fn test_resource_ref_bare_and_populated() {
        let bare: ResourceRef = serde_json::from_str(r#""res-1""#).unwrap();
        assert_eq!(bare.id(), "res-1");
        assert!(bare.as_full().is_none());

        let full: ResourceRef =
            serde_json::from_str(r#"{"id":"res-1","name":"Waiver","requirements":[]}"#).unwrap();
        assert_eq!(full.id(), "res-1");
        assert!(full.as_full().is_some());
    }

    #[test]
    fn test_item_status_never_read_from_wire() {
        let item: PreferenceItem = serde_json::from_str(
            r#"{"id":"m1","name":"Waiver","program":"p1","resource":"res-1"}"#,
        )
        .unwrap();
        assert_eq!(item.status, Status::New);
        assert!(item.response.is_none());
        assert!(item.applicability.is_empty());
    }

    #[test]
    fn test_role_type_wire_mapping() {
        assert_eq!(RoleType::from_wire(2), Some(RoleType::Participant));
        assert_eq!(RoleType::from_wire(4), Some(RoleType::Leader));
        assert_eq!(RoleType::from_wire(7), None);
        assert_eq!(RoleType::Organizer.flag_index(), 3);
    }
}
