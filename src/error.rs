use thiserror::Error;

/// Errors raised while editing a document locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("`{field}` is not an editable list of this document")]
    UnknownField { field: String },

    #[error("row {index} is out of range for `{field}` ({len} rows)")]
    RowOutOfRange {
        field: String,
        index: usize,
        len: usize,
    },

    #[error("{0}")]
    NotEditable(String),

    #[error("the editor session is closed")]
    Closed,
}
