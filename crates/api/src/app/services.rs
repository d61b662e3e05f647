//! Service wiring shared by every handler.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::Utc;
use serde::Serialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use proventory_audit::{AuditAction, AuditEntry};
use proventory_auth::effective_permissions;
use proventory_core::{TenantId, UserId};
use proventory_infra::{
    AppConfig, Backend, BackendConfig, BackendError, ChangeFeed, Repositories, SessionCache, UserSession,
};
use proventory_notifications::{Notification, NotificationKind};
use proventory_reports::PrintStage;

use crate::context::{PrincipalContext, TenantContext};

pub struct AppServices {
    pub repos: Repositories,
    pub backend: Arc<dyn Backend>,
    pub feed: ChangeFeed,
    pub sessions: SessionCache,
    print: RwLock<HashMap<(TenantId, UserId), PrintStage>>,
}

/// In-memory services for dev and tests.
pub fn build_in_memory() -> AppServices {
    let config = AppConfig {
        bind: ([127, 0, 0, 1], 0).into(),
        jwt_secret: String::new(),
        backend: BackendConfig::InMemory,
        realtime_capacity: 256,
    };
    build_services(&config)
}

pub fn build_services(config: &AppConfig) -> AppServices {
    let feed = ChangeFeed::new(config.realtime_capacity);
    let backend = proventory_infra::connect(&config.backend, feed.clone());
    AppServices {
        repos: Repositories::new(backend.clone()),
        backend,
        feed,
        sessions: SessionCache::default(),
        print: RwLock::new(HashMap::new()),
    }
}

impl AppServices {
    /// Cached session for the caller; reloaded when the token's roles differ
    /// from the cached ones.
    pub async fn session(
        &self,
        tenant: &TenantContext,
        principal: &PrincipalContext,
    ) -> Result<UserSession, BackendError> {
        let now = Utc::now();
        let tenant_id = tenant.tenant_id();
        let user_id = principal.user_id();
        let role_names: Vec<String> = principal.roles().iter().map(|r| r.as_str().to_string()).collect();

        if let Some(s) = self.sessions.get(tenant_id, user_id, now) {
            if s.roles == role_names {
                return Ok(s);
            }
        }

        let records = self.repos.roles.list(tenant_id).await?;
        let session = UserSession {
            user_id,
            tenant_id,
            email: principal.email().map(str::to_string),
            roles: role_names,
            permissions: effective_permissions(principal.roles(), &records),
            loaded_at: now,
        };
        self.sessions.put(session.clone());
        Ok(session)
    }

    /// Append to the audit log. Failures are logged, never surfaced.
    #[allow(clippy::too_many_arguments)]
    pub async fn audit<T: Serialize>(
        &self,
        tenant: &TenantContext,
        principal: &PrincipalContext,
        action: AuditAction,
        table: &str,
        record_id: impl ToString,
        old: Option<&T>,
        new: Option<&T>,
    ) {
        let entry = AuditEntry::record(
            tenant.tenant_id(),
            principal.user_id(),
            action,
            table,
            Some(record_id.to_string()),
            old.and_then(|v| serde_json::to_value(v).ok()),
            new.and_then(|v| serde_json::to_value(v).ok()),
            Utc::now(),
        );
        if let Err(e) = self.repos.audit.insert(&entry).await {
            tracing::warn!(tenant_id = %tenant.tenant_id(), table, error = %e, "failed to write audit entry");
        }
    }

    /// Deliver an in-app notification. Failures are logged, never surfaced.
    pub async fn notify(
        &self,
        tenant_id: TenantId,
        recipient: UserId,
        kind: NotificationKind,
        title: String,
        message: String,
        link: Option<String>,
    ) {
        let notification = match Notification::new(tenant_id, recipient, kind, title, message, link, Utc::now()) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed notification");
                return;
            }
        };
        if let Err(e) = self.repos.notifications.insert(&notification).await {
            tracing::warn!(%tenant_id, error = %e, "failed to deliver notification");
        }
    }

    pub fn with_print_stage<R>(&self, tenant_id: TenantId, user_id: UserId, f: impl FnOnce(&mut PrintStage) -> R) -> R {
        let mut stages = self.print.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(stages.entry((tenant_id, user_id)).or_default())
    }
}

/// Tenant-filtered SSE stream of committed changes.
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.feed.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(change) if change.tenant_id == tenant_id => {
            let data = serde_json::to_string(&change).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(change.table.clone()).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
