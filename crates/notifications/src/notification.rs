use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use proventory_core::{DomainError, Entity, TenantId, TenantScoped, UserId};

use crate::timestamp::{format_absolute, format_relative, parse_timestamp};

proventory_core::record_id!(
    /// Notification identifier.
    NotificationId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    ApprovalRequested,
    ApprovalDecided,
    LowStock,
    System,
}

/// In-app notification addressed to a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub tenant_id: TenantId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub read: bool,
    /// Raw value as stored by the backend; see [`crate::parse_timestamp`].
    pub created_at: String,
}

impl Notification {
    pub fn new(
        tenant_id: TenantId,
        recipient: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        link: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("notification title cannot be empty"));
        }
        Ok(Self {
            id: NotificationId::generate(),
            tenant_id,
            recipient,
            kind,
            title,
            message: message.into(),
            link,
            read: false,
            created_at: now.to_rfc3339(),
        })
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at).ok()
    }

    /// Returns whether the flag changed.
    pub fn mark_read(&mut self) -> bool {
        let changed = !self.read;
        self.read = true;
        changed
    }

    pub fn view(&self, now: DateTime<Utc>) -> NotificationView {
        let ts = self.timestamp();
        NotificationView {
            notification: self.clone(),
            relative_time: ts.map(|t| format_relative(t, now)),
            absolute_time: ts.map(format_absolute),
        }
    }
}

impl Entity for Notification {
    type Id = NotificationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Notification {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Notification decorated with display times.
///
/// Unparseable timestamps yield `None` rather than failing the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub relative_time: Option<String>,
    pub absolute_time: Option<String>,
}

pub fn unread_count(notifications: &[Notification], recipient: UserId) -> usize {
    notifications
        .iter()
        .filter(|n| n.recipient == recipient && !n.read)
        .count()
}

/// Newest first; entries with unparseable timestamps sink to the bottom.
pub fn sort_newest_first(notifications: &mut [Notification]) {
    notifications.sort_by_cached_key(|n| std::cmp::Reverse(n.timestamp()));
}
