use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// External numeric id (audit id or interview id).
pub type DocId = u64;

/// The editor routes that autosave their document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKind {
    Sipoc,
    Findings,
    InterviewQa,
}

/// How quickly a kind of document settles before it is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceClass {
    /// Documents with many list fields (SIPOC, findings).
    MultiField,
    /// One free-text answer at a time (interview Q&A).
    SingleAnswer,
}

/// A text-keyed map annotating the entries of a list field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyedList {
    pub list: &'static str,
    pub map: &'static str,
}

impl DocKind {
    /// Path segment of the remote resource: `/{resource}/{id}`.
    pub fn resource(&self) -> &'static str {
        match self {
            DocKind::Sipoc => "sipoc",
            DocKind::Findings => "findings",
            DocKind::InterviewQa => "interview-responses",
        }
    }

    pub fn debounce_class(&self) -> DebounceClass {
        match self {
            DocKind::Sipoc | DocKind::Findings => DebounceClass::MultiField,
            DocKind::InterviewQa => DebounceClass::SingleAnswer,
        }
    }

    /// Ordered sequences of strings edited row by row.
    pub fn list_fields(&self) -> &'static [&'static str] {
        match self {
            DocKind::Sipoc => &[
                "suppliers_json",
                "inputs_json",
                "process_json",
                "outputs_json",
                "customers_json",
            ],
            DocKind::Findings => &["findings_json", "root_causes_json", "recommendations_json"],
            DocKind::InterviewQa => &[],
        }
    }

    /// Findings carry a priority map keyed by the finding's text.
    pub fn keyed_list(&self) -> Option<KeyedList> {
        match self {
            DocKind::Findings => Some(KeyedList {
                list: "findings_json",
                map: "priority_json",
            }),
            _ => None,
        }
    }

    /// Map of question key to answer text.
    pub fn answers_field(&self) -> Option<&'static str> {
        match self {
            DocKind::InterviewQa => Some("answers_json"),
            _ => None,
        }
    }

    pub fn is_list_field(&self, field: &str) -> bool {
        self.list_fields().contains(&field)
    }
}

impl fmt::Display for DocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocKind::Sipoc => "SIPOC",
            DocKind::Findings => "Findings",
            DocKind::InterviewQa => "Interview Q&A",
        };
        f.write_str(name)
    }
}

/// Priority level attached to a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_class_follows_route() {
        assert_eq!(DocKind::Sipoc.debounce_class(), DebounceClass::MultiField);
        assert_eq!(DocKind::Findings.debounce_class(), DebounceClass::MultiField);
        assert_eq!(DocKind::InterviewQa.debounce_class(), DebounceClass::SingleAnswer);
    }

    #[test]
    fn only_findings_have_a_keyed_list() {
        let keyed = DocKind::Findings.keyed_list().unwrap();
        assert_eq!(keyed.list, "findings_json");
        assert_eq!(keyed.map, "priority_json");
        assert!(DocKind::Sipoc.keyed_list().is_none());
        assert!(DocKind::Findings.is_list_field(keyed.list));
    }

    #[test]
    fn priority_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert_eq!(" low ".parse::<Priority>(), Ok(Priority::Low));
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(serde_json::to_value(Priority::Critical).unwrap(), "Critical");
    }
}
