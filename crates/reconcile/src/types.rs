//! Core types for declarative reconciliation

use crate::policy::FieldDiff;
use crate::value::Fields;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a resource should exist on the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

/// Identifies a resource within a run: kind, device and business key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceIdentity {
    pub kind: String,
    pub device: String,
    /// Caller-supplied key; always wins over a same-named payload field
    pub key: String,
}

impl ResourceIdentity {
    pub fn new(kind: &str, device: &str, key: &str) -> Self {
        Self {
            kind: kind.to_string(),
            device: device.to_string(),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' on {}", self.kind, self.key, self.device)
    }
}

/// What the caller wants
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredState {
    pub ensure: Ensure,
    pub fields: Fields,
}

/// One declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    pub identity: ResourceIdentity,
    pub desired: DesiredState,
}

impl ResourceSpec {
    pub fn present(kind: &str, device: &str, key: &str, fields: Fields) -> Self {
        Self {
            identity: ResourceIdentity::new(kind, device, key),
            desired: DesiredState {
                ensure: Ensure::Present,
                fields,
            },
        }
    }

    pub fn absent(kind: &str, device: &str, key: &str) -> Self {
        Self {
            identity: ResourceIdentity::new(kind, device, key),
            desired: DesiredState {
                ensure: Ensure::Absent,
                fields: Fields::new(),
            },
        }
    }
}

/// An item as read back from the device
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedEntry {
    /// Opaque remote id; `None` for singletons
    pub remote_id: Option<String>,
    pub key: String,
    pub fields: Fields,
}

/// Observed items of one kind on one device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedSet {
    entries: Vec<ObservedEntry>,
}

impl ObservedSet {
    pub fn new(entries: Vec<ObservedEntry>) -> Self {
        Self { entries }
    }

    /// First entry with the given business key
    pub fn find(&self, key: &str) -> Option<&ObservedEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObservedEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A change that a dry run would make
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Create,
    Update(Vec<FieldDiff>),
    Delete,
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update(diffs) => write!(f, "update ({} fields)", diffs.len()),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Result of reconciling one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// Observed state already matches
    NoChange,
    Created,
    Modified,
    Removed,
    /// Dry run: the change that would have been made
    Planned(PlannedAction),
    Failed { error: String },
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a write that happened
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::NoChange => "○",
            Self::Created | Self::Modified | Self::Removed => "✓",
            Self::Planned(_) => "~",
            Self::Failed { .. } => "✗",
        }
    }
}

/// Counts over a run's results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub planned: usize,
    pub failed: usize,
}

impl ApplySummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.total_changes() + self.unchanged + self.planned + self.failed
    }

    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.unchanged += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Planned(_) => self.planned += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
        }
    }
}
