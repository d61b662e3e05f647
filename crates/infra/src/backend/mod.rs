//! Backend client seam.
//!
//! Records are JSON rows in named tables, always scoped by tenant. Every row
//! carries an `id` and a `tenant_id` column.

mod memory;
mod query;
mod rest;

pub use memory::{InMemoryBackend, RpcHandler};
pub use query::Query;
pub use rest::RestBackend;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use proventory_core::TenantId;

use crate::error::BackendError;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn select(&self, tenant_id: TenantId, table: &str, query: &Query) -> Result<Vec<JsonValue>, BackendError>;

    /// Inserts a row and returns the stored representation.
    async fn insert(&self, tenant_id: TenantId, table: &str, row: JsonValue) -> Result<JsonValue, BackendError>;

    /// Patches the columns present in `patch` and returns the stored row.
    async fn update(
        &self,
        tenant_id: TenantId,
        table: &str,
        id: &str,
        patch: JsonValue,
    ) -> Result<JsonValue, BackendError>;

    async fn delete(&self, tenant_id: TenantId, table: &str, id: &str) -> Result<(), BackendError>;

    /// Calls a server-side function.
    async fn rpc(&self, tenant_id: TenantId, function: &str, args: JsonValue) -> Result<JsonValue, BackendError>;
}

pub(crate) fn row_id(row: &JsonValue) -> Result<String, BackendError> {
    match row.get("id") {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(JsonValue::Number(n)) => Ok(n.to_string()),
        _ => Err(BackendError::Decode("row has no 'id' column".to_string())),
    }
}
