//! Realtime change feed.
//!
//! Lossy broadcast: slow subscribers miss messages and are expected to refetch.

use serde::Serialize;
use tokio::sync::broadcast;

use proventory_core::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One committed write, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub tenant_id: TenantId,
    pub table: String,
    pub record_id: String,
    pub op: ChangeOp,
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, tenant_id: TenantId, table: &str, record_id: impl Into<String>, op: ChangeOp) {
        let change = Change {
            tenant_id,
            table: table.to_string(),
            record_id: record_id.into(),
            op,
        };
        // No subscribers is not an error.
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_changes() {
        let feed = ChangeFeed::new(8);
        let mut rx = feed.subscribe();
        let tenant = TenantId::new();
        feed.publish(tenant, "items", "abc", ChangeOp::Insert);
        let change = rx.recv().await.unwrap();
        assert_eq!(change.tenant_id, tenant);
        assert_eq!(change.table, "items");
        assert_eq!(change.op, ChangeOp::Insert);
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let feed = ChangeFeed::new(1);
        feed.publish(TenantId::new(), "items", "x", ChangeOp::Delete);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
