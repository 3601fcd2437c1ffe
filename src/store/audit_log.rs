use parking_lot::Mutex;

use crate::domain::{AuditEntry, AuditLog, NewAuditEntry, Result};

#[derive(Default, Debug)]
pub struct InMemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditLog for InMemoryAuditLog {
    fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry> {
        let mut entries = self.entries.lock();
        let entry = AuditEntry {
            id: entries.len() as i64 + 1,
            actor: entry.actor,
            action: entry.action,
            target: entry.target,
            detail: entry.detail,
            at: entry.at,
        };
        tracing::info!(
            target: "coin_ledger::audit",
            id = entry.id,
            actor = %entry.actor,
            action = ?entry.action,
            target_entity = %entry.target,
            detail = entry.detail.as_deref(),
            "audit"
        );
        entries.push(entry.clone());
        Ok(entry)
    }

    fn for_target(&self, target: &str) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.target == target)
            .cloned()
            .collect()
    }

    fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}
