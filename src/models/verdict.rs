use std::fmt;
use serde::{Deserialize, Serialize};

/// Message attached to optional probes whose failure was downgraded.
pub const NON_MANDATORY_MESSAGE: &str = "Non-mandatory endpoint, not supported by back-end";

/// Plain state label as it appears in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Valid,
    Invalid,
    Missing,
    Error,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            State::Valid => "Valid",
            State::Invalid => "Invalid",
            State::Missing => "Missing",
            State::Error => "Error",
        };
        f.write_str(label)
    }
}

/// Where a probe failed and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub input: String,
    pub error: String,
    pub details: String,
}

impl Diagnostic {
    pub fn new(input: impl Into<String>, error: impl Into<String>, details: impl AsRef<str>) -> Self {
        Diagnostic {
            input: input.into(),
            error: error.into(),
            details: normalize_details(details.as_ref()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Input: {}; Error: {}; Details: {}", self.input, self.error, self.details)
    }
}

/// Collapses newlines and runs of whitespace to single spaces and swaps
/// double quotes for single ones, so the text embeds cleanly in the report.
pub fn normalize_details(raw: &str) -> String {
    raw.replace('"', "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Passed. Carries a note when the pass is a downgraded optional failure.
    Valid(Option<String>),
    Invalid(Diagnostic),
    Missing(Diagnostic),
    Error(Diagnostic),
}

impl Verdict {
    pub fn state(&self) -> State {
        match self {
            Verdict::Valid(_) => State::Valid,
            Verdict::Invalid(_) => State::Invalid,
            Verdict::Missing(_) => State::Missing,
            Verdict::Error(_) => State::Error,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid(_))
    }

    /// `Valid` and `Missing` are acceptable; anything else fails the group.
    pub fn fails_group(&self) -> bool {
        matches!(self, Verdict::Invalid(_) | Verdict::Error(_))
    }

    pub fn message(&self) -> String {
        match self {
            Verdict::Valid(note) => note.clone().unwrap_or_default(),
            Verdict::Invalid(d) | Verdict::Missing(d) | Verdict::Error(d) => d.to_string(),
        }
    }

    /// Optional probes never fail: anything but `Valid` becomes `Valid` with
    /// the fixed note and the original diagnostic is dropped.
    pub fn apply_optionality(self, optional: bool) -> Verdict {
        if optional && !self.is_valid() {
            Verdict::Valid(Some(NON_MANDATORY_MESSAGE.to_string()))
        } else {
            self
        }
    }
}
