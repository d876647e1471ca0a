//! Observability
//!
//! Structured JSON-lines logging of engine events. Logging is synchronous,
//! never fails the operation being logged, and never records bound values.
//!
//! ```ignore
//! use rowkeeper::observability::{log_event, Event};
//!
//! log_event(Event::BatchCommitted, &[("table", "dbo.[Person]"), ("items", "3")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log an event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
