use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use proventory_core::DomainError;
use proventory_infra::Query as BackendQuery;
use proventory_notifications::{Notification, NotificationId, sort_newest_first, unread_count};

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{self, CmdAuth, authorized, parse_id};
use crate::app::services::AppServices;
use crate::authz::perms;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications).post(send_notification))
        .route("/unread-count", get(get_unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/:id/read", post(mark_read))
}

async fn mine(services: &AppServices, tenant: &TenantContext, principal: &PrincipalContext) -> ApiResult<Vec<Notification>> {
    let query = BackendQuery::new().eq("recipient", principal.user_id());
    Ok(services.repos.notifications.find(tenant.tenant_id(), &query).await?)
}

/// The caller's notifications, newest first, with display times.
pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::NotificationQuery>,
) -> ApiResult {
    let mut list = mine(&services, &tenant, &principal).await?;
    if query.unread_only {
        list.retain(|n| !n.read);
    }
    sort_newest_first(&mut list);
    let now = Utc::now();
    common::list(list.iter().map(|n| n.view(now)).collect())
}

pub async fn get_unread_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let list = mine(&services, &tenant, &principal).await?;
    common::ok(serde_json::json!({ "unread": unread_count(&list, principal.user_id()) }))
}

pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: NotificationId = parse_id(&id)?;
    let mut notification = services.repos.notifications.get(tenant.tenant_id(), &id).await?;
    // Other users' notifications are invisible, not forbidden.
    if notification.recipient != principal.user_id() {
        return Err(DomainError::NotFound.into());
    }
    if notification.mark_read() {
        notification = services.repos.notifications.save(&notification).await?;
    }
    common::ok(notification.view(Utc::now()))
}

pub async fn mark_all_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let list = mine(&services, &tenant, &principal).await?;
    let mut updated = 0usize;
    for mut n in list {
        if n.mark_read() {
            services.repos.notifications.save(&n).await?;
            updated += 1;
        }
    }
    common::ok(serde_json::json!({ "updated": updated }))
}

/// Send a notification to another user of the tenant.
pub async fn send_notification(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::SendNotificationRequest>,
) -> ApiResult {
    let (req, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::NOTIFICATIONS_SEND])).await?;
    let notification = Notification::new(
        tenant.tenant_id(),
        req.recipient,
        req.kind,
        req.title,
        req.message,
        req.link,
        Utc::now(),
    )?;
    let stored = services.repos.notifications.insert(&notification).await?;
    common::created(stored.view(Utc::now()))
}
