use std::str::FromStr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use proventory_auth::{CommandAuthorization, Permission};
use proventory_core::DomainError;
use proventory_infra::UserSession;

use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

/// Small helper wrapper to associate required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CmdAuth<C> {
    pub fn new(inner: C, required: &[&'static str]) -> Self {
        Self {
            inner,
            required: required.iter().map(|p| Permission::new(*p)).collect(),
        }
    }
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Resolve the caller's session and check `cmd` against it.
pub async fn authorized<C>(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    cmd: CmdAuth<C>,
) -> ApiResult<(C, UserSession)> {
    let session = services.session(tenant, principal).await?;
    authz::authorize_command(tenant, principal, &session.permissions, &cmd)?;
    Ok((cmd.inner, session))
}

pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    Ok(raw.parse::<T>()?)
}

pub fn ok(body: impl Serialize) -> ApiResult {
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub fn created(body: impl Serialize) -> ApiResult {
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `{ "items": [...] }`, the list envelope every collection endpoint uses.
pub fn list<T: Serialize>(items: Vec<T>) -> ApiResult {
    ok(serde_json::json!({ "items": items }))
}
