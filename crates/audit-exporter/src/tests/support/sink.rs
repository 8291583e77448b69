//! Entry sink that records everything it receives.

use std::sync::{Arc, Mutex};

use crate::consumer::EntrySink;
use crate::entry::{AuditEntry, RequestEntry, ResponseEntry};

#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("sink mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("sink mutex poisoned").len()
    }

    /// `(kind, request id)` pairs in arrival order.
    pub fn labels(&self) -> Vec<(String, String)> {
        self.entries()
            .iter()
            .map(|entry| (entry.kind().to_owned(), entry.request_id().to_owned()))
            .collect()
    }

    fn record(&self, entry: AuditEntry) {
        self.entries.lock().expect("sink mutex poisoned").push(entry);
    }
}

impl EntrySink for RecordingSink {
    fn handle_request(&mut self, entry: &RequestEntry) {
        self.record(AuditEntry::from(entry.clone()));
    }

    fn handle_response(&mut self, entry: &ResponseEntry) {
        self.record(AuditEntry::from(entry.clone()));
    }
}
