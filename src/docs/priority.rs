//! Priority map keyed by finding text.
//!
//! The server stores `priority_json` as `{ "<finding text>": "<level>" }`, so the
//! entry has to follow the text when a finding is renamed and disappear when
//! it is removed. Two findings with identical text share one entry; the last
//! write wins.

use serde_json::Value;
use tracing::debug;

use crate::error::EditError;

use super::list;
use super::types::{KeyedList, Priority};
use super::Document;

/// Rename finding `index`, moving its priority entry to the new text.
/// A blank new text drops the entry.
pub fn rename_finding(doc: &mut Document, keyed: KeyedList, index: usize, new_text: &str) -> Result<String, EditError> {
    let old_text = list::change_row(doc, keyed.list, index, new_text)?;
    if old_text == new_text {
        return Ok(old_text);
    }

    let mut priorities = doc.map(keyed.map);
    if let Some(level) = priorities.remove(&old_text) {
        if !new_text.trim().is_empty() {
            priorities.insert(new_text.to_string(), level);
        }
        debug!(from = %old_text, to = %new_text, "priority entry migrated");
        doc.set_map(keyed.map, priorities);
    }
    Ok(old_text)
}

/// Remove finding `index` and its priority entry.
pub fn remove_finding(doc: &mut Document, keyed: KeyedList, index: usize) -> Result<String, EditError> {
    let removed = list::remove_row(doc, keyed.list, index)?;
    let mut priorities = doc.map(keyed.map);
    if priorities.remove(&removed).is_some() {
        doc.set_map(keyed.map, priorities);
    }
    Ok(removed)
}

/// Set the priority of finding `index`. Blank findings cannot carry a priority.
pub fn set_priority(doc: &mut Document, index: usize, level: Priority) -> Result<String, EditError> {
    let keyed = doc.kind.keyed_list().ok_or_else(|| {
        EditError::NotEditable(format!("{} documents have no priorities", doc.kind))
    })?;
    let findings = doc.list(keyed.list);
    let text = findings.get(index).cloned().ok_or(EditError::RowOutOfRange {
        field: keyed.list.to_string(),
        index,
        len: findings.len(),
    })?;
    if text.trim().is_empty() {
        return Err(EditError::NotEditable(
            "write the finding before giving it a priority".to_string(),
        ));
    }

    let mut priorities = doc.map(keyed.map);
    priorities.insert(text.clone(), Value::String(level.as_str().to_string()));
    doc.set_map(keyed.map, priorities);
    Ok(text)
}

/// Priority currently recorded for `text`, if any.
pub fn priority_of(doc: &Document, text: &str) -> Option<Priority> {
    let keyed = doc.kind.keyed_list()?;
    doc.map(keyed.map)
        .get(text)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}
