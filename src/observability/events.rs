//! Observable events
//!
//! Every lifecycle event the service logs is named here so log consumers can
//! rely on a fixed vocabulary.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    /// Startup begins
    BootStart,
    /// Configuration loaded and validated
    ConfigLoaded,
    /// HTTP listener bound, ready for requests
    Serving,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,
    /// Listener or runtime failure (FATAL)
    ServerFailed,

    // Requests
    /// Stream request rejected before any output
    RequestRejected,

    // Streams
    /// Columnar schema inferred and frozen
    SchemaFrozen,
    /// Fields outside the frozen schema were dropped from a batch
    FieldsDropped,
    /// Client went away before the stream finished
    StreamCancelled,
    /// Row source or encoder failed mid-stream
    StreamAborted,
    /// One chunk accepted by the sink (TRACE only)
    FrameWritten,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "QUERYSTREAM_STARTUP_BEGIN",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "QUERYSTREAM_SERVING",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::ServerFailed => "SERVER_FAILED",

            Event::RequestRejected => "REQUEST_REJECTED",

            Event::SchemaFrozen => "SCHEMA_FROZEN",
            Event::FieldsDropped => "FIELDS_DROPPED",
            Event::StreamCancelled => "STREAM_CANCELLED",
            Event::StreamAborted => "STREAM_ABORTED",
            Event::FrameWritten => "FRAME_WRITTEN",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::ServerFailed)
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
    fn test_event_names_are_screaming_snake() {
        for event in [
            Event::BootStart,
            Event::Serving,
            Event::SchemaFrozen,
            Event::StreamCancelled,
            Event::StreamAborted,
            Event::FrameWritten,
        ] {
            let name = event.as_str();
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_only_server_failure_is_fatal() {
        assert!(Event::ServerFailed.is_fatal());
        assert!(!Event::StreamAborted.is_fatal());
    }
}
