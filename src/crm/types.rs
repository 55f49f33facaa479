//! Lead, action and process rows, their write-side inputs, and the field
//! enums used to filter them.

use serde::{Deserialize, Deserializer, Serialize};

use crate::db::{Column, DbError, Entity, Record, Value};

pub const DEFAULT_LEAD_STATUS: &str = "new";
pub const ACTIVE_PROCESS_STATUS: &str = "active";

// =============================================================================
// Leads
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadField {
    Id,
    Name,
    Email,
    Status,
    Url,
}

impl Column for LeadField {
    fn name(&self) -> &'static str {
        match self {
            LeadField::Id => "id",
            LeadField::Name => "name",
            LeadField::Email => "email",
            LeadField::Status => "status",
            LeadField::Url => "url",
        }
    }
}

/// A row from the `leads` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: String,
    pub url: Option<String>,
}

impl Entity for Lead {
    type Field = LeadField;
    const COLLECTION: &'static str = "leads";
    const ID: LeadField = LeadField::Id;
    const SCHEMA: &'static [(&'static str, &'static str)] = &[
        ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        ("name", "TEXT"),
        ("email", "TEXT"),
        ("status", "TEXT NOT NULL DEFAULT 'new'"),
        ("url", "TEXT"),
    ];

    fn from_record(record: &Record) -> Result<Self, DbError> {
        Ok(Lead {
            id: record.integer("id")?,
            name: record.opt_text("name")?,
            email: record.opt_text("email")?,
            status: record.text("status")?,
            url: record.opt_text("url")?,
        })
    }
}

/// Input for `create_lead`. The email is expected to be lower-cased already.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl NewLead {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Column values to insert, with a missing status defaulted to `"new"`.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with("name", &self.name)
            .with("email", &self.email)
            .with(
                "status",
                self.status.as_deref().unwrap_or(DEFAULT_LEAD_STATUS),
            );
        if let Some(url) = &self.url {
            record.set("url", url);
        }
        record
    }
}

/// Partial lead update. `None` leaves a column alone; for the nullable
/// columns `Some(None)` writes NULL. `status: Some(None)` is rejected.
///
/// When deserialized, an absent key maps to `None` and an explicit `null`
/// to `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LeadUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub status: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub url: Option<Option<String>>,
}

impl LeadUpdate {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(Some(status.into())),
            ..Self::default()
        }
    }

    pub fn clears_status(&self) -> bool {
        matches!(self.status, Some(None))
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.status.is_none() && self.url.is_none()
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        if let Some(name) = &self.name {
            record.set("name", name);
        }
        if let Some(email) = &self.email {
            record.set("email", email);
        }
        if let Some(status) = &self.status {
            record.set("status", status.clone());
        }
        if let Some(url) = &self.url {
            record.set("url", url.clone());
        }
        record
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// Actions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionField {
    Id,
    LeadId,
    ActionType,
    Details,
    Timestamp,
}

impl Column for ActionField {
    fn name(&self) -> &'static str {
        match self {
            ActionField::Id => "id",
            ActionField::LeadId => "lead_id",
            ActionField::ActionType => "action_type",
            ActionField::Details => "details",
            ActionField::Timestamp => "timestamp",
        }
    }
}

/// A row from the `actions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: i64,
    /// `None` only for rows carried over from databases without the column filled.
    pub lead_id: Option<i64>,
    pub action_type: Option<String>,
    pub details: Option<String>,
    pub timestamp: String,
}

impl Entity for Action {
    type Field = ActionField;
    const COLLECTION: &'static str = "actions";
    const ID: ActionField = ActionField::Id;
    const SCHEMA: &'static [(&'static str, &'static str)] = &[
        ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        ("lead_id", "INTEGER"),
        ("action_type", "TEXT"),
        ("details", "TEXT"),
        ("timestamp", "TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))"),
    ];

    fn from_record(record: &Record) -> Result<Self, DbError> {
        Ok(Action {
            id: record.integer("id")?,
            lead_id: record.opt_integer("lead_id")?,
            action_type: record.opt_text("action_type")?,
            details: record.opt_text("details")?,
            timestamp: record.text("timestamp")?,
        })
    }
}

/// Input for `create_action`. A missing or blank timestamp means "now".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAction {
    pub lead_id: i64,
    pub action_type: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl NewAction {
    pub fn new(lead_id: i64, action_type: impl Into<String>) -> Self {
        Self {
            lead_id,
            action_type: action_type.into(),
            ..Self::default()
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn at(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub(crate) fn to_record(&self, timestamp: &str) -> Record {
        Record::new()
            .with("lead_id", self.lead_id)
            .with("action_type", &self.action_type)
            .with("details", self.details.clone())
            .with("timestamp", timestamp)
    }
}

// =============================================================================
// Processes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessField {
    Id,
    Name,
    LeadId,
    Channel,
    LastActionId,
    NextFollowupDatetime,
    Status,
}

impl Column for ProcessField {
    fn name(&self) -> &'static str {
        match self {
            ProcessField::Id => "id",
            ProcessField::Name => "name",
            ProcessField::LeadId => "lead_id",
            ProcessField::Channel => "channel",
            ProcessField::LastActionId => "last_action_id",
            ProcessField::NextFollowupDatetime => "next_followup_datetime",
            ProcessField::Status => "status",
        }
    }
}

/// A row from the `processes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: i64,
    pub name: Option<String>,
    pub lead_id: Option<i64>,
    pub channel: Option<String>,
    pub last_action_id: Option<i64>,
    pub next_followup_datetime: Option<String>,
    pub status: Option<String>,
}

impl Entity for Process {
    type Field = ProcessField;
    const COLLECTION: &'static str = "processes";
    const ID: ProcessField = ProcessField::Id;
    const SCHEMA: &'static [(&'static str, &'static str)] = &[
        ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        ("name", "TEXT"),
        ("lead_id", "INTEGER"),
        ("channel", "TEXT"),
        ("last_action_id", "INTEGER"),
        ("next_followup_datetime", "TEXT"),
        ("status", "TEXT"),
    ];

    fn from_record(record: &Record) -> Result<Self, DbError> {
        Ok(Process {
            id: record.integer("id")?,
            name: record.opt_text("name")?,
            lead_id: record.opt_integer("lead_id")?,
            channel: record.opt_text("channel")?,
            last_action_id: record.opt_integer("last_action_id")?,
            next_followup_datetime: record.opt_text("next_followup_datetime")?,
            status: record.opt_text("status")?,
        })
    }
}

impl Process {
    /// Whether this process already mirrors `action` and its follow-up time.
    pub(crate) fn tracks(&self, action: &Action, next_followup: &str) -> bool {
        self.last_action_id == Some(action.id)
            && self.channel == action.action_type
            && self.next_followup_datetime.as_deref() == Some(next_followup)
    }
}

/// Input for `create_process`, the low-level path that skips the
/// one-process-per-lead bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProcess {
    #[serde(default)]
    pub name: Option<String>,
    pub lead_id: i64,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub last_action_id: Option<i64>,
    #[serde(default)]
    pub next_followup_datetime: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl NewProcess {
    pub fn to_record(&self) -> Record {
        let mut record = Record::new().with("lead_id", self.lead_id);
        let optional: [(&str, Value); 5] = [
            ("name", self.name.clone().into()),
            ("channel", self.channel.clone().into()),
            ("last_action_id", self.last_action_id.into()),
            ("next_followup_datetime", self.next_followup_datetime.clone().into()),
            ("status", self.status.clone().into()),
        ];
        for (column, value) in optional {
            if !value.is_null() {
                record.set(column, value);
            }
        }
        record
    }
}

/// Outcome of `reconcile_processes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Leads with at least one action.
    pub leads_checked: usize,
    /// Processes created for leads that had actions but none.
    pub created: usize,
    /// Processes rewritten to point at the lead's latest action.
    pub refreshed: usize,
    /// Extra process rows removed.
    pub duplicates_removed: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.created == 0 && self.refreshed == 0 && self.duplicates_removed == 0
    }
}
