//! Infrastructure layer: backend client, repositories, realtime feed, config.

pub mod backend;
pub mod config;
pub mod error;
pub mod feed;
pub mod repo;
pub mod session;

use std::sync::Arc;

use serde_json::{Value as JsonValue, json};

use proventory_core::TenantId;

pub use backend::{Backend, InMemoryBackend, Query, RestBackend};
pub use config::{AppConfig, BackendConfig, ConfigError};
pub use error::BackendError;
pub use feed::{Change, ChangeFeed, ChangeOp};
pub use repo::{Repositories, Repository, WorkflowRepository, tables};
pub use session::{SessionCache, UserSession};

/// Build the configured backend, wired to `feed`.
pub fn connect(config: &BackendConfig, feed: ChangeFeed) -> Arc<dyn Backend> {
    match config {
        BackendConfig::Rest { url, key } => {
            tracing::info!(url = %url, "using REST backend");
            Arc::new(RestBackend::new(url.clone(), key.clone(), feed))
        }
        BackendConfig::InMemory => {
            tracing::info!("using in-memory backend");
            let backend = InMemoryBackend::new(feed);
            // Credentials live with the hosted auth service; locally the call always succeeds.
            let change_password: backend::RpcHandler =
                Arc::new(|_tenant: TenantId, _args: JsonValue| -> Result<JsonValue, BackendError> {
                    Ok(json!({ "changed": true }))
                });
            backend.register_rpc("change_password", change_password);
            Arc::new(backend)
        }
    }
}
