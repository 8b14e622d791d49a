//! ObservationScope for begin/complete/failed logging around save and load
//!
//! - Logs the begin event on creation
//! - Logs the complete event with elapsed time on `complete()`
//! - Logs the failed event on `fail()` or when dropped unfinished

use std::time::Instant;

use super::events::Event;
use super::logger::{Logger, Severity};

pub struct ObservationScope {
    complete_event: Event,
    failed_event: Event,
    fields: Vec<(&'static str, String)>,
    started: Instant,
    finished: bool,
}

impl ObservationScope {
    /// Scope around one save of attribute `name`.
    pub fn save(name: &str) -> Self {
        Self::new(Event::SaveBegin, Event::SaveComplete, Event::SaveFailed, name)
    }

    /// Scope around one load of attribute `name`.
    pub fn load(name: &str) -> Self {
        Self::new(Event::LoadBegin, Event::LoadComplete, Event::LoadFailed, name)
    }

    fn new(begin: Event, complete_event: Event, failed_event: Event, name: &str) -> Self {
        let fields = vec![("attribute", name.to_string())];
        Logger::log(begin.severity(), begin.as_str(), &borrow(&fields));
        Self {
            complete_event,
            failed_event,
            fields,
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.started.elapsed().as_millis().to_string();
        let mut fields = borrow(&self.fields);
        fields.push(("elapsed_ms", &elapsed));
        fields.extend_from_slice(extra);
        Logger::log(
            self.complete_event.severity(),
            self.complete_event.as_str(),
            &fields,
        );
    }

    pub fn fail(mut self, code: &str, reason: &str) {
        self.finished = true;
        let mut fields = borrow(&self.fields);
        fields.push(("code", code));
        fields.push(("reason", reason));
        Logger::log(
            self.failed_event.severity(),
            self.failed_event.as_str(),
            &fields,
        );
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            let mut fields = borrow(&self.fields);
            fields.push(("reason", "scope dropped without completion"));
            Logger::log(Severity::Warn, self.failed_event.as_str(), &fields);
        }
    }
}

fn borrow<'a>(fields: &'a [(&'static str, String)]) -> Vec<(&'static str, &'a str)> {
    fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
}
