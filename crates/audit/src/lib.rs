//! Audit trail records: who changed what, and when.

pub mod entry;

pub use entry::{AuditAction, AuditEntry, AuditEntryId, AuditFilter, changed_fields};
