use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use proventory_core::TenantId;

use super::{Backend, Query, row_id};
use crate::error::BackendError;
use crate::feed::{ChangeFeed, ChangeOp};
use crate::repo::tables;

pub type RpcHandler = Arc<dyn Fn(TenantId, JsonValue) -> Result<JsonValue, BackendError> + Send + Sync>;

/// Tenant-isolated in-memory tables for dev and tests.
///
/// Rows keep insertion order, which is what an unordered select returns.
pub struct InMemoryBackend {
    tables: RwLock<HashMap<(TenantId, String), Vec<JsonValue>>>,
    rpcs: RwLock<HashMap<String, RpcHandler>>,
    feed: ChangeFeed,
}

fn poisoned() -> BackendError {
    BackendError::Transport("in-memory store lock poisoned".to_string())
}

/// First unique column on which `row` clashes with another stored row.
fn duplicate_key(table: &str, rows: &[JsonValue], row: &JsonValue, skip_id: Option<&str>) -> Option<&'static str> {
    tables::unique_columns(table).iter().copied().find(|column| {
        let Some(value) = row.get(*column).filter(|v| !v.is_null()) else {
            return false;
        };
        rows.iter()
            .filter(|r| skip_id.is_none() || row_id(r).ok().as_deref() != skip_id)
            .any(|r| r.get(*column) == Some(value))
    })
}

impl InMemoryBackend {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            rpcs: RwLock::new(HashMap::new()),
            feed,
        }
    }

    pub fn register_rpc(&self, name: impl Into<String>, handler: RpcHandler) {
        if let Ok(mut rpcs) = self.rpcs.write() {
            rpcs.insert(name.into(), handler);
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(ChangeFeed::default())
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn select(&self, tenant_id: TenantId, table: &str, query: &Query) -> Result<Vec<JsonValue>, BackendError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let rows = tables
            .get(&(tenant_id, table.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(query.apply(rows))
    }

    async fn insert(&self, tenant_id: TenantId, table: &str, mut row: JsonValue) -> Result<JsonValue, BackendError> {
        let obj = row
            .as_object_mut()
            .ok_or_else(|| BackendError::Decode("row must be a JSON object".to_string()))?;
        obj.insert("tenant_id".to_string(), JsonValue::String(tenant_id.to_string()));
        let id = row_id(&row)?;

        {
            let mut tables = self.tables.write().map_err(|_| poisoned())?;
            let rows = tables.entry((tenant_id, table.to_string())).or_default();
            if rows.iter().any(|r| row_id(r).ok().as_deref() == Some(id.as_str())) {
                return Err(BackendError::Conflict(format!("{table} record '{id}' already exists")));
            }
            if let Some(column) = duplicate_key(table, rows, &row, None) {
                return Err(BackendError::Conflict(format!("{table}.{column} must be unique")));
            }
            rows.push(row.clone());
        }

        self.feed.publish(tenant_id, table, id, ChangeOp::Insert);
        Ok(row)
    }

    async fn update(
        &self,
        tenant_id: TenantId,
        table: &str,
        id: &str,
        patch: JsonValue,
    ) -> Result<JsonValue, BackendError> {
        let JsonValue::Object(patch) = patch else {
            return Err(BackendError::Decode("patch must be a JSON object".to_string()));
        };

        let updated = {
            let mut tables = self.tables.write().map_err(|_| poisoned())?;
            let rows = tables
                .get_mut(&(tenant_id, table.to_string()))
                .ok_or_else(|| BackendError::not_found(table, id))?;
            let pos = rows
                .iter()
                .position(|r| row_id(r).ok().as_deref() == Some(id))
                .ok_or_else(|| BackendError::not_found(table, id))?;
            let mut row = rows[pos].clone();
            if let Some(obj) = row.as_object_mut() {
                for (k, v) in patch {
                    // id and tenant are immutable
                    if k != "id" && k != "tenant_id" {
                        obj.insert(k, v);
                    }
                }
            }
            if let Some(column) = duplicate_key(table, rows, &row, Some(id)) {
                return Err(BackendError::Conflict(format!("{table}.{column} must be unique")));
            }
            rows[pos] = row.clone();
            row
        };

        self.feed.publish(tenant_id, table, id, ChangeOp::Update);
        Ok(updated)
    }

    async fn delete(&self, tenant_id: TenantId, table: &str, id: &str) -> Result<(), BackendError> {
        {
            let mut tables = self.tables.write().map_err(|_| poisoned())?;
            let rows = tables
                .get_mut(&(tenant_id, table.to_string()))
                .ok_or_else(|| BackendError::not_found(table, id))?;
            let before = rows.len();
            rows.retain(|r| row_id(r).ok().as_deref() != Some(id));
            if rows.len() == before {
                return Err(BackendError::not_found(table, id));
            }
        }

        self.feed.publish(tenant_id, table, id, ChangeOp::Delete);
        Ok(())
    }

    async fn rpc(&self, tenant_id: TenantId, function: &str, args: JsonValue) -> Result<JsonValue, BackendError> {
        let handler = {
            let rpcs = self.rpcs.read().map_err(|_| poisoned())?;
            rpcs.get(function).cloned()
        };
        match handler {
            Some(h) => h(tenant_id, args),
            None => Err(BackendError::not_found("rpc", function)),
        }
    }
}
