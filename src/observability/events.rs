//! Observable attribute events
//!
//! Events are explicit and typed. Each maps to a fixed event name and a
//! default severity.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Queued changes applied and published
    Commit,
    /// A divide by zero change was skipped
    DivideByZero,
    SaveBegin,
    SaveComplete,
    SaveFailed,
    LoadBegin,
    LoadComplete,
    LoadFailed,
    /// Committed doc id limit lowered
    LidSpaceCompacted,
    /// Storage truncated to the committed doc id limit
    LidSpaceShrunk,
    /// A commit covered serial numbers below the last sync token
    SerialRegression,
    /// Retired storage handed back to the allocator
    GenerationsReclaimed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Commit => "ATTRIBUTE_COMMIT",
            Event::DivideByZero => "ATTRIBUTE_DIVIDE_BY_ZERO",
            Event::SaveBegin => "ATTRIBUTE_SAVE_BEGIN",
            Event::SaveComplete => "ATTRIBUTE_SAVE_COMPLETE",
            Event::SaveFailed => "ATTRIBUTE_SAVE_FAILED",
            Event::LoadBegin => "ATTRIBUTE_LOAD_BEGIN",
            Event::LoadComplete => "ATTRIBUTE_LOAD_COMPLETE",
            Event::LoadFailed => "ATTRIBUTE_LOAD_FAILED",
            Event::LidSpaceCompacted => "ATTRIBUTE_LID_SPACE_COMPACTED",
            Event::LidSpaceShrunk => "ATTRIBUTE_LID_SPACE_SHRUNK",
            Event::SerialRegression => "ATTRIBUTE_SERIAL_REGRESSION",
            Event::GenerationsReclaimed => "ATTRIBUTE_GENERATIONS_RECLAIMED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Event::Commit | Event::GenerationsReclaimed => Severity::Trace,
            Event::DivideByZero | Event::SerialRegression => Severity::Warn,
            Event::SaveFailed | Event::LoadFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
