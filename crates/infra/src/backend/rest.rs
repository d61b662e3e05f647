use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value as JsonValue;

use proventory_core::TenantId;

use super::{Backend, Query, row_id};
use crate::error::BackendError;
use crate::feed::{ChangeFeed, ChangeOp};

/// PostgREST-style client for the hosted backend.
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    key: String,
    feed: ChangeFeed,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, key: impl Into<String>, feed: ChangeFeed) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            feed,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    fn scoped(tenant_id: TenantId, id: &str) -> [(String, String); 2] {
        [
            ("id".to_string(), format!("eq.{id}")),
            ("tenant_id".to_string(), format!("eq.{tenant_id}")),
        ]
    }

    async fn send(table: &str, id: &str, rb: RequestBuilder) -> Result<Response, BackendError> {
        let resp = rb.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        tracing::warn!(table, id, status = status.as_u16(), "backend request failed");
        Err(match status {
            StatusCode::NOT_FOUND => BackendError::not_found(table, id),
            StatusCode::CONFLICT => BackendError::Conflict(message),
            _ => BackendError::Http {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// `return=representation` answers are arrays; an empty one means no row matched.
    async fn single_row(table: &str, id: &str, resp: Response) -> Result<JsonValue, BackendError> {
        let rows: Vec<JsonValue> = resp.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(table, id))
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, tenant_id: TenantId, table: &str, query: &Query) -> Result<Vec<JsonValue>, BackendError> {
        let mut params = vec![("tenant_id".to_string(), format!("eq.{tenant_id}"))];
        params.extend(query.to_params());
        tracing::debug!(%tenant_id, table, "select");

        let rb = self.request(Method::GET, self.table_url(table)).query(&params);
        let resp = Self::send(table, "", rb).await?;
        Ok(resp.json().await?)
    }

    async fn insert(&self, tenant_id: TenantId, table: &str, mut row: JsonValue) -> Result<JsonValue, BackendError> {
        let obj = row
            .as_object_mut()
            .ok_or_else(|| BackendError::Decode("row must be a JSON object".to_string()))?;
        obj.insert("tenant_id".to_string(), JsonValue::String(tenant_id.to_string()));
        let id = row_id(&row)?;
        tracing::debug!(%tenant_id, table, record_id = %id, "insert");

        let rb = self
            .request(Method::POST, self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let resp = Self::send(table, &id, rb).await?;
        let stored = Self::single_row(table, &id, resp).await?;

        self.feed.publish(tenant_id, table, id, ChangeOp::Insert);
        Ok(stored)
    }

    async fn update(
        &self,
        tenant_id: TenantId,
        table: &str,
        id: &str,
        patch: JsonValue,
    ) -> Result<JsonValue, BackendError> {
        tracing::debug!(%tenant_id, table, record_id = id, "update");
        let rb = self
            .request(Method::PATCH, self.table_url(table))
            .query(&Self::scoped(tenant_id, id))
            .header("Prefer", "return=representation")
            .json(&patch);
        let resp = Self::send(table, id, rb).await?;
        let stored = Self::single_row(table, id, resp).await?;

        self.feed.publish(tenant_id, table, id, ChangeOp::Update);
        Ok(stored)
    }

    async fn delete(&self, tenant_id: TenantId, table: &str, id: &str) -> Result<(), BackendError> {
        tracing::debug!(%tenant_id, table, record_id = id, "delete");
        let rb = self
            .request(Method::DELETE, self.table_url(table))
            .query(&Self::scoped(tenant_id, id))
            .header("Prefer", "return=representation");
        let resp = Self::send(table, id, rb).await?;
        Self::single_row(table, id, resp).await?;

        self.feed.publish(tenant_id, table, id, ChangeOp::Delete);
        Ok(())
    }

    async fn rpc(&self, tenant_id: TenantId, function: &str, args: JsonValue) -> Result<JsonValue, BackendError> {
        tracing::debug!(%tenant_id, function, "rpc");
        let url = format!("{}/rest/v1/rpc/{function}", self.base_url);
        let rb = self.request(Method::POST, url).json(&args);
        let resp = Self::send("rpc", function, rb).await?;
        let body = resp.bytes().await?;
        if body.is_empty() {
            return Ok(JsonValue::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
