//! Row editing for fields that are ordered sequences of strings.
//!
//! Indices are stable: rows are appended at the end and removal shifts the
//! following rows down by one. There is no reordering.

use crate::error::EditError;

use super::Document;

/// Append an empty row and return its index.
pub fn add_row(doc: &mut Document, field: &str) -> usize {
    let mut rows = doc.list(field);
    rows.push(String::new());
    let index = rows.len() - 1;
    doc.set_list(field, rows);
    index
}

/// Replace row `index`, returning the previous text.
pub fn change_row(doc: &mut Document, field: &str, index: usize, value: &str) -> Result<String, EditError> {
    let mut rows = doc.list(field);
    check_index(field, index, rows.len())?;
    let previous = std::mem::replace(&mut rows[index], value.to_string());
    doc.set_list(field, rows);
    Ok(previous)
}

/// Remove row `index`, returning its text.
pub fn remove_row(doc: &mut Document, field: &str, index: usize) -> Result<String, EditError> {
    let mut rows = doc.list(field);
    check_index(field, index, rows.len())?;
    let removed = rows.remove(index);
    doc.set_list(field, rows);
    Ok(removed)
}

fn check_index(field: &str, index: usize, len: usize) -> Result<(), EditError> {
    if index < len {
        Ok(())
    } else {
        Err(EditError::RowOutOfRange {
            field: field.to_string(),
            index,
            len,
        })
    }
}
