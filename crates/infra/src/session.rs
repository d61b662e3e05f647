//! Cached user sessions.
//!
//! Resolving a session means reading role records from the backend, so the
//! result is kept per user until it expires or a role change invalidates it.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use proventory_auth::Permission;
use proventory_core::{TenantId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSession {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<Permission>,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionCache {
    ttl: Duration,
    inner: RwLock<HashMap<(TenantId, UserId), UserSession>>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Fresh session for the user, if cached.
    pub fn get(&self, tenant_id: TenantId, user_id: UserId, now: DateTime<Utc>) -> Option<UserSession> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, user_id))
            .filter(|s| now - s.loaded_at < self.ttl)
            .cloned()
    }

    pub fn put(&self, session: UserSession) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((session.tenant_id, session.user_id), session);
        }
    }

    pub fn invalidate(&self, tenant_id: TenantId, user_id: UserId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&(tenant_id, user_id));
        }
    }

    /// Drop every session of a tenant (after role edits).
    pub fn invalidate_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _), _| *t != tenant_id);
        }
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(Duration::minutes(5))
    }
}
