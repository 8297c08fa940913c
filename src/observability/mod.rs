//! Observability for querystream
//!
//! - Structured JSON logging on stderr
//! - Typed lifecycle events
//! - Process-wide stream counters
//!
//! # Usage
//!
//! ```ignore
//! use querystream::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::Serving, &[("addr", "0.0.0.0:8000")]);
//!
//! let scope = ObservationScope::with_fields("STREAM", &[("format", "arrow")]);
//! // ... drive the stream ...
//! scope.complete_with_fields(&[("rows", "1000")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, StreamMetrics};
pub use scope::ObservationScope;

fn event_severity(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(event_severity(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event_severity(event), event.as_str(), fields);
}
