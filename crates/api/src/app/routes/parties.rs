//! Handlers shared by the supplier and customer screens.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use proventory_audit::AuditAction;
use proventory_infra::Query as BackendQuery;
use proventory_parties::{Party, PartyId, PartyKind, RegisterParty, SuspendParty, UpdateDetails};

use crate::app::errors::ApiResult;
use crate::app::routes::common::{self, CmdAuth, authorized, parse_id};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

/// One party screen: which kind it manages and the permissions guarding it.
pub trait PartyScreen: Send + Sync + 'static {
    const KIND: PartyKind;
    const READ: &'static str;
    const WRITE: &'static str;
}

pub fn router<S: PartyScreen>() -> Router {
    Router::new()
        .route("/", post(register::<S>).get(list::<S>))
        .route("/:id", get(get_one::<S>).patch(update::<S>))
        .route("/:id/suspend", post(suspend::<S>))
}

async fn load<S: PartyScreen>(services: &AppServices, tenant: &TenantContext, id: &str) -> ApiResult<Party> {
    let id: PartyId = parse_id(id)?;
    let party = services.repos.parties(S::KIND).get(tenant.tenant_id(), &id).await?;
    party.ensure_kind(S::KIND)?;
    Ok(party)
}

pub async fn register<S: PartyScreen>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<RegisterParty>,
) -> ApiResult {
    let (cmd, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[S::WRITE])).await?;
    let repo = services.repos.parties(S::KIND);

    let party = Party::register(tenant.tenant_id(), S::KIND, cmd, Utc::now())?;
    let stored = repo.insert(&party).await?;
    services
        .audit(&tenant, &principal, AuditAction::Insert, repo.table(), stored.id, None, Some(&stored))
        .await;
    tracing::info!(tenant_id = %tenant.tenant_id(), party_id = %stored.id, kind = S::KIND.as_str(), "party registered");
    common::created(stored)
}

pub async fn list<S: PartyScreen>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[S::READ])).await?;
    let parties = services
        .repos
        .parties(S::KIND)
        .find(tenant.tenant_id(), &BackendQuery::new().order_asc("name"))
        .await?;
    common::list(parties.into_iter().filter(|p| p.kind == S::KIND).collect())
}

pub async fn get_one<S: PartyScreen>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[S::READ])).await?;
    common::ok(load::<S>(&services, &tenant, &id).await?)
}

pub async fn update<S: PartyScreen>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateDetails>,
) -> ApiResult {
    let (cmd, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[S::WRITE])).await?;
    let before = load::<S>(&services, &tenant, &id).await?;
    let mut party = before.clone();
    party.update(cmd, Utc::now())?;

    let repo = services.repos.parties(S::KIND);
    let stored = repo.save(&party).await?;
    services
        .audit(&tenant, &principal, AuditAction::Update, repo.table(), stored.id, Some(&before), Some(&stored))
        .await;
    common::ok(stored)
}

pub async fn suspend<S: PartyScreen>(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<SuspendParty>>,
) -> ApiResult {
    let cmd = body.map(|Json(b)| b).unwrap_or_default();
    let (cmd, _) = authorized(&services, &tenant, &principal, CmdAuth::new(cmd, &[S::WRITE])).await?;
    let before = load::<S>(&services, &tenant, &id).await?;
    let mut party = before.clone();
    party.suspend(cmd, Utc::now())?;

    let repo = services.repos.parties(S::KIND);
    let stored = repo.save(&party).await?;
    services
        .audit(&tenant, &principal, AuditAction::Update, repo.table(), stored.id, Some(&before), Some(&stored))
        .await;
    tracing::info!(tenant_id = %tenant.tenant_id(), party_id = %stored.id, "party suspended");
    common::ok(stored)
}
