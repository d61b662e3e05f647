use std::sync::Arc;

use axum::{extract::Extension, Json};

use proventory_auth::{PasswordChange, validate_password_change};

use crate::app::errors::ApiResult;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

/// Validate a password change locally, then hand it to the auth provider.
///
/// Any authenticated user may change their own password.
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(change): Json<PasswordChange>,
) -> ApiResult {
    validate_password_change(&change)?;

    let args = serde_json::json!({
        "user_id": principal.user_id(),
        "current_password": change.current_password,
        "new_password": change.new_password,
    });
    services.backend.rpc(tenant.tenant_id(), "change_password", args).await?;
    services.sessions.invalidate(tenant.tenant_id(), principal.user_id());
    tracing::info!(tenant_id = %tenant.tenant_id(), user_id = %principal.user_id(), "password changed");
    common::ok(serde_json::json!({ "changed": true }))
}
