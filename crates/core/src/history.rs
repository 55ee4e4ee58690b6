//! Field-level change history for historized entities.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::Record;

/// One field that differs between two consecutive states.
///
/// Absent fields are reported as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub from: Value,
    pub to: Value,
    pub timestamp: DateTime<Utc>,
}

/// Changes recorded by a single `update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub changes: Vec<FieldChange>,
}

impl HistoryEntry {
    pub fn change_for(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }
}

/// Field-by-field diff over the union of both records' fields, in field-name order.
pub fn diff(old: &Record, new: &Record, at: DateTime<Utc>) -> Vec<FieldChange> {
    let fields: BTreeSet<&String> = old.fields().chain(new.fields()).collect();

    fields
        .into_iter()
        .filter_map(|field| {
            let from = old.get(field).cloned().unwrap_or(Value::Null);
            let to = new.get(field).cloned().unwrap_or(Value::Null);
            (from != to).then(|| FieldChange {
                field: field.clone(),
                from,
                to,
                timestamp: at,
            })
        })
        .collect()
}

/// Append an entry for `old -> new` to `prior` when anything changed.
///
/// A no-op update returns `prior` unchanged.
pub fn extend_history(prior: &[HistoryEntry], old: &Record, new: &Record) -> Vec<HistoryEntry> {
    let now = Utc::now();
    let changes = diff(old, new, now);
    let mut next = prior.to_vec();
    if !changes.is_empty() {
        tracing::trace!(changed = changes.len(), "recording history entry");
        next.push(HistoryEntry {
            timestamp: now,
            changes,
        });
    }
    next
}
