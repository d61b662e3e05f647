use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use proventory_core::{DomainError, Entity, TenantId, TenantScoped, UserId};

proventory_core::record_id!(
    /// Audit entry identifier.
    AuditEntryId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
    Login,
    Approve,
    Reject,
}

impl core::str::FromStr for AuditAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "login" => Ok(Self::Login),
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(DomainError::validation(format!("unknown audit action '{other}'"))),
        }
    }
}

/// One row of the audit log. Entries are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub tenant_id: TenantId,
    pub actor: UserId,
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: Option<String>,
    pub old_values: Option<JsonValue>,
    pub new_values: Option<JsonValue>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        tenant_id: TenantId,
        actor: UserId,
        action: AuditAction,
        table_name: impl Into<String>,
        record_id: Option<String>,
        old_values: Option<JsonValue>,
        new_values: Option<JsonValue>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId::generate(),
            tenant_id,
            actor,
            action,
            table_name: table_name.into(),
            record_id,
            old_values,
            new_values,
            occurred_at: now,
        }
    }

    pub fn changed_fields(&self) -> Vec<String> {
        changed_fields(self.old_values.as_ref(), self.new_values.as_ref())
    }
}

impl Entity for AuditEntry {
    type Id = AuditEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for AuditEntry {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Top-level keys whose values differ between two JSON objects.
///
/// Non-object values compare as a whole and report `"*"` when they differ.
pub fn changed_fields(old: Option<&JsonValue>, new: Option<&JsonValue>) -> Vec<String> {
    match (old, new) {
        (Some(JsonValue::Object(a)), Some(JsonValue::Object(b))) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            keys.into_iter()
                .filter(|k| a.get(*k) != b.get(*k))
                .cloned()
                .collect()
        }
        (None, None) => Vec::new(),
        (a, b) if a == b => Vec::new(),
        _ => vec!["*".to_string()],
    }
}

/// Query filter for the audit screen. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuditFilter {
    pub table_name: Option<String>,
    pub actor: Option<UserId>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(DomainError::validation("'from' must not be after 'to'"));
            }
        }
        Ok(())
    }

    /// `from` is inclusive, `to` exclusive.
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.table_name.as_deref().is_none_or(|t| t == entry.table_name)
            && self.actor.is_none_or(|a| a == entry.actor)
            && self.action.is_none_or(|a| a == entry.action)
            && self.from.is_none_or(|f| entry.occurred_at >= f)
            && self.to.is_none_or(|t| entry.occurred_at < t)
    }

    /// Matching entries, newest first.
    pub fn apply<'a>(&self, entries: &'a [AuditEntry]) -> Vec<&'a AuditEntry> {
        let mut out: Vec<&AuditEntry> = entries.iter().filter(|e| self.matches(e)).collect();
        out.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        out
    }
}
