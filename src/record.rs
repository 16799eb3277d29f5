//! Inspection records and their text rendering

use serde::Serialize;

/// Result of inspecting the variable at one checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum Outcome {
    #[serde(rename = "ok")]
    Printed { value: String },
    #[serde(rename = "error")]
    Error { message: String },
}

/// One `(tag, outcome)` pair, produced once per marker interception
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectionRecord {
    pub tag: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl InspectionRecord {
    pub fn printed(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            outcome: Outcome::Printed {
                value: value.into(),
            },
        }
    }

    pub fn error(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            outcome: Outcome::Error {
                message: message.into(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Printed { .. })
    }

    /// The two output lines for this record, each starting with `prefix`.
    pub fn text_lines(&self, prefix: &str) -> [String; 2] {
        let second = match &self.outcome {
            Outcome::Printed { value } => format!("{prefix}PRINT: {}", escape_line(value)),
            Outcome::Error { message } => format!("{prefix}ERROR: {}", escape_line(message)),
        };
        [format!("{prefix}TAG: {}", escape_line(&self.tag)), second]
    }
}

/// Escape line breaks so a value always occupies a single output line.
///
/// Backslashes are doubled so an escaped line break cannot be confused with
/// text that already contained `\n`.
pub fn escape_line(text: &str) -> String {
    if !text.contains(['\\', '\n', '\r']) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}
