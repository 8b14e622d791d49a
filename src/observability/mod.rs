//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Per-attribute counters
//! - Begin/complete/failed scopes around save and load
//!
//! Observability is read-only: nothing here changes attribute state, and a
//! failed log write is ignored.

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log `event` at its default severity.
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
