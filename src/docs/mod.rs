pub mod list;
pub mod priority;
pub mod types;

use serde_json::{Map, Value};

use crate::api::ApiError;
use crate::error::EditError;

use types::{DocId, DocKind};

/// Local mirror of a remote document.
///
/// Fields are kept as raw JSON so that a full-document replace never drops
/// data this editor does not understand.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub kind: DocKind,
    pub id: DocId,
    fields: Map<String, Value>,
}

impl Document {
    pub fn new(kind: DocKind, id: DocId, fields: Map<String, Value>) -> Self {
        Self { kind, id, fields }
    }

    /// Build a document from an API response body. The body must be a JSON object.
    pub fn from_value(kind: DocKind, id: DocId, value: Value) -> Result<Self, ApiError> {
        match value {
            Value::Object(fields) => Ok(Self::new(kind, id, fields)),
            other => Err(ApiError::Decode(format!(
                "expected a JSON object for {} {}, got {}",
                kind,
                id,
                json_type(&other)
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Short human label, e.g. `SIPOC #12`.
    pub fn label(&self) -> String {
        format!("{} #{}", self.kind, self.id)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Read a list field. Accepts a JSON array, a string holding a
    /// JSON-encoded array, or null/absent (empty).
    pub fn list(&self, name: &str) -> Vec<String> {
        let decoded = match self.fields.get(name) {
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).ok(),
            other => other.cloned(),
        };
        match decoded {
            Some(Value::Array(items)) => items.into_iter().map(value_text).collect(),
            _ => Vec::new(),
        }
    }

    pub fn set_list(&mut self, name: &str, rows: Vec<String>) {
        let rows = rows.into_iter().map(Value::String).collect();
        self.set_field(name, Value::Array(rows));
    }

    /// Read an object field with the same tolerance as [`Document::list`].
    pub fn map(&self, name: &str) -> Map<String, Value> {
        let decoded = match self.fields.get(name) {
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).ok(),
            other => other.cloned(),
        };
        match decoded {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn set_map(&mut self, name: &str, map: Map<String, Value>) {
        self.set_field(name, Value::Object(map));
    }

    /// blake3 of the canonical JSON body. serde_json maps are sorted, so equal
    /// documents always hash equally.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(&self.fields).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }

    pub fn short_fingerprint(&self) -> String {
        self.fingerprint()[..12].to_string()
    }

    /// Append an empty row.
    pub fn add_row(&mut self, field: &str) -> Result<usize, EditError> {
        self.ensure_list(field)?;
        Ok(list::add_row(self, field))
    }

    /// Replace row `index`. On the keyed findings list the priority entry
    /// follows the text.
    pub fn change_row(&mut self, field: &str, index: usize, value: &str) -> Result<String, EditError> {
        self.ensure_list(field)?;
        match self.kind.keyed_list() {
            Some(keyed) if keyed.list == field => priority::rename_finding(self, keyed, index, value),
            _ => list::change_row(self, field, index, value),
        }
    }

    /// Remove row `index`. On the keyed findings list the priority entry is dropped too.
    pub fn remove_row(&mut self, field: &str, index: usize) -> Result<String, EditError> {
        self.ensure_list(field)?;
        match self.kind.keyed_list() {
            Some(keyed) if keyed.list == field => priority::remove_finding(self, keyed, index),
            _ => list::remove_row(self, field, index),
        }
    }

    pub fn set_answer(&mut self, question: &str, answer: &str) -> Result<(), EditError> {
        let field = self.kind.answers_field().ok_or_else(|| {
            EditError::NotEditable(format!("{} documents have no answers", self.kind))
        })?;
        let question = question.trim();
        if question.is_empty() {
            return Err(EditError::NotEditable("question key must not be blank".to_string()));
        }
        let mut answers = self.map(field);
        answers.insert(question.to_string(), Value::String(answer.to_string()));
        self.set_map(field, answers);
        Ok(())
    }

    fn ensure_list(&self, field: &str) -> Result<(), EditError> {
        if self.kind.is_list_field(field) {
            Ok(())
        } else {
            Err(EditError::UnknownField {
                field: field.to_string(),
            })
        }
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
