//! Identity-lifecycle notification
//!
//! An external identity-mapping layer assigns document ids to global ids
//! and reports puts and removes through `GidToLidChangeHandler`. This crate
//! only provides the no-op handler for document types nothing references.

use std::collections::BTreeSet;
use std::fmt;

use crate::attribute::DocId;

pub type SerialNum = u64;

/// Globally unique document identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalId(pub [u8; 12]);

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

pub trait GidToLidChangeListener: Send {
    fn notify_put_done(&mut self, gid: GlobalId, doc: DocId);
    fn notify_remove(&mut self, gid: GlobalId);
    fn name(&self) -> &str;
    fn doc_type_name(&self) -> &str;
}

pub trait GidToLidChangeHandler {
    fn notify_put_done(&mut self, gid: GlobalId, doc: DocId, serial: SerialNum);
    fn notify_remove(&mut self, gid: GlobalId, serial: SerialNum);
    fn notify_remove_done(&mut self, gid: GlobalId, serial: SerialNum);
    fn add_listener(&mut self, listener: Box<dyn GidToLidChangeListener>);
    /// Drop listeners of `doc_type` whose names are not in `keep`.
    fn remove_listeners(&mut self, doc_type: &str, keep: &BTreeSet<String>);
}

/// Handler for document types nothing references.
#[derive(Debug, Default)]
pub struct DummyGidToLidChangeHandler;

impl GidToLidChangeHandler for DummyGidToLidChangeHandler {
    fn notify_put_done(&mut self, _: GlobalId, _: DocId, _: SerialNum) {}

    fn notify_remove(&mut self, _: GlobalId, _: SerialNum) {}

    fn notify_remove_done(&mut self, _: GlobalId, _: SerialNum) {}

    fn add_listener(&mut self, _: Box<dyn GidToLidChangeListener>) {}

    fn remove_listeners(&mut self, _: &str, _: &BTreeSet<String>) {}
}
