//! Observable events
//!
//! Every log line emitted by the crate carries one of these as its `event`
//! field so that logs can be filtered on a stable name.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration file loaded and validated
    ConfigLoaded,

    // Connection
    /// Socket opened (AUTH/SELECT follow)
    ConnectionOpen,
    /// QUIT sent, socket released
    ConnectionClose,
    /// One command written, one reply read
    CommandExecute,

    // Query processing
    /// Condition tree compiled into a Lua program
    ScriptCompiled,
    /// Primary key lookup chosen instead of a scan
    FastPathLookup,
    /// Query short-circuited without touching the server
    QueryEmulated,
    /// Query finished
    QueryComplete,
    /// Relation rows attached to a result
    RelationPopulated,

    // Explain
    /// Explain produced (no network)
    ExplainComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ConnectionOpen => "CONNECTION_OPEN",
            Event::ConnectionClose => "CONNECTION_CLOSE",
            Event::CommandExecute => "COMMAND_EXECUTE",
            Event::ScriptCompiled => "SCRIPT_COMPILED",
            Event::FastPathLookup => "FAST_PATH_LOOKUP",
            Event::QueryEmulated => "QUERY_EMULATED",
            Event::QueryComplete => "QUERY_COMPLETE",
            Event::RelationPopulated => "RELATION_POPULATED",
            Event::ExplainComplete => "EXPLAIN_COMPLETE",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::ConnectionOpen,
            Event::ConnectionClose,
            Event::CommandExecute,
            Event::ScriptCompiled,
            Event::FastPathLookup,
            Event::QueryEmulated,
            Event::QueryComplete,
            Event::RelationPopulated,
            Event::ExplainComplete,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::FastPathLookup), "FAST_PATH_LOOKUP");
        assert_eq!(format!("{}", Event::QueryComplete), "QUERY_COMPLETE");
    }
}
