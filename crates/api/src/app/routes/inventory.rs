use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use proventory_audit::AuditAction;
use proventory_core::{DomainError, TenantId};
use proventory_infra::{Query as BackendQuery, tables};
use proventory_inventory::{
    AdjustStock, Category, CategoryId, CreateCategory, CreateItem, Item, ItemId, StockStatus, UpdateCategory,
    UpdateItem, ensure_unique_name, low_stock,
};
use proventory_notifications::NotificationKind;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::app::routes::common::{self, CmdAuth, authorized, parse_id};
use crate::app::services::AppServices;
use crate::authz::perms;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route("/items/:id", get(get_item).patch(update_item).delete(delete_item))
        .route("/items/:id/adjust", post(adjust_stock))
        .route("/low-stock", get(list_low_stock))
        .route("/categories", post(create_category).get(list_categories))
        .route(
            "/categories/:id",
            get(get_category).patch(update_category).delete(delete_category),
        )
}

// ─────────────────────────────────────────────────────────────────────────────
// Items
// ─────────────────────────────────────────────────────────────────────────────

async fn ensure_category_exists(
    services: &AppServices,
    tenant_id: TenantId,
    category_id: Option<CategoryId>,
) -> ApiResult<()> {
    if let Some(id) = category_id {
        if let Err(e) = services.repos.categories.get(tenant_id, &id).await {
            return Err(match e.to_domain() {
                Some(DomainError::NotFound) => DomainError::validation("category_id does not exist").into(),
                _ => e.into(),
            });
        }
    }
    Ok(())
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreateItem>,
) -> ApiResult {
    let (cmd, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::INVENTORY_WRITE])).await?;
    let tenant_id = tenant.tenant_id();

    let item = Item::create(tenant_id, cmd, Utc::now())?;
    ensure_category_exists(&services, tenant_id, item.category_id).await?;

    let clash = services
        .repos
        .items
        .find(tenant_id, &BackendQuery::new().eq("sku", &item.sku).limit(1))
        .await?;
    if !clash.is_empty() {
        return Err(DomainError::conflict(format!("SKU '{}' is already in use", item.sku)).into());
    }

    let stored = services.repos.items.insert(&item).await?;
    services
        .audit(&tenant, &principal, AuditAction::Insert, tables::ITEMS, stored.id, None, Some(&stored))
        .await;
    tracing::info!(tenant_id = %tenant_id, item_id = %stored.id, sku = %stored.sku, "item created");
    common::created(dto::item_to_json(&stored))
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ItemListQuery>,
) -> ApiResult {
    let (query, _) = authorized(&services, &tenant, &principal, CmdAuth::new(query, &[perms::INVENTORY_READ])).await?;

    let mut backend_query = BackendQuery::new().order_asc("sku");
    if let Some(active) = query.active {
        backend_query = backend_query.eq("active", active);
    }
    if let Some(category_id) = query.category_id {
        backend_query = backend_query.eq("category_id", category_id);
    }

    let items = services.repos.items.find(tenant.tenant_id(), &backend_query).await?;
    common::list(items.iter().map(dto::item_to_json).collect())
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::INVENTORY_READ])).await?;
    let id: ItemId = parse_id(&id)?;
    let item = services.repos.items.get(tenant.tenant_id(), &id).await?;
    common::ok(dto::item_to_json(&item))
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateItem>,
) -> ApiResult {
    let (cmd, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::INVENTORY_WRITE])).await?;
    let id: ItemId = parse_id(&id)?;
    let tenant_id = tenant.tenant_id();

    ensure_category_exists(&services, tenant_id, cmd.category_id).await?;
    let before = services.repos.items.get(tenant_id, &id).await?;
    let mut item = before.clone();
    item.update(cmd, Utc::now())?;

    let stored = services.repos.items.save(&item).await?;
    services
        .audit(&tenant, &principal, AuditAction::Update, tables::ITEMS, id, Some(&before), Some(&stored))
        .await;
    common::ok(dto::item_to_json(&stored))
}

/// Items referenced by purchase orders cannot be deleted; deactivate them instead.
pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::INVENTORY_WRITE])).await?;
    let id: ItemId = parse_id(&id)?;
    let tenant_id = tenant.tenant_id();

    let item = services.repos.items.get(tenant_id, &id).await?;
    let orders = services.repos.orders.list(tenant_id).await?;
    if orders.iter().any(|o| o.ordered_quantity(id) > 0) {
        return Err(DomainError::conflict("item is used on purchase orders; deactivate it instead").into());
    }

    services.repos.items.delete(tenant_id, &id).await?;
    services
        .audit(&tenant, &principal, AuditAction::Delete, tables::ITEMS, id, Some(&item), None)
        .await;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<AdjustStock>,
) -> ApiResult {
    let (cmd, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::INVENTORY_ADJUST])).await?;
    let id: ItemId = parse_id(&id)?;
    let tenant_id = tenant.tenant_id();

    let before = services.repos.items.get(tenant_id, &id).await?;
    let mut item = before.clone();
    item.adjust(&cmd, Utc::now())?;

    let stored = services.repos.items.save(&item).await?;
    services
        .audit(&tenant, &principal, AuditAction::Update, tables::ITEMS, id, Some(&before), Some(&stored))
        .await;
    notify_if_low(&services, tenant_id, &principal, &before, &stored).await;

    tracing::info!(tenant_id = %tenant_id, item_id = %id, delta = cmd.delta, "stock adjusted");
    common::ok(dto::item_to_json(&stored))
}

/// Tell the person who moved stock when an item just dropped to reorder level.
pub(crate) async fn notify_if_low(
    services: &AppServices,
    tenant_id: TenantId,
    principal: &PrincipalContext,
    before: &Item,
    after: &Item,
) {
    let status = after.stock_status();
    if status == StockStatus::InStock || status == before.stock_status() {
        return;
    }
    let title = match status {
        StockStatus::OutOfStock => format!("{} is out of stock", after.name),
        _ => format!("{} is running low", after.name),
    };
    services
        .notify(
            tenant_id,
            principal.user_id(),
            NotificationKind::LowStock,
            title,
            format!("{} on hand, reorder level {}", after.quantity, after.reorder_level),
            Some(format!("/inventory/items/{}", after.id)),
        )
        .await;
}

pub async fn list_low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::INVENTORY_READ])).await?;
    let items = services.repos.items.list(tenant.tenant_id()).await?;
    common::list(low_stock(&items).into_iter().map(dto::item_to_json).collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Categories
// ─────────────────────────────────────────────────────────────────────────────

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreateCategory>,
) -> ApiResult {
    let (cmd, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::INVENTORY_WRITE])).await?;
    let tenant_id = tenant.tenant_id();

    let category = Category::create(tenant_id, cmd, Utc::now())?;
    let existing = services.repos.categories.list(tenant_id).await?;
    ensure_unique_name(&category, &existing)?;

    let stored = services.repos.categories.insert(&category).await?;
    services
        .audit(&tenant, &principal, AuditAction::Insert, tables::CATEGORIES, stored.id, None, Some(&stored))
        .await;
    common::created(stored)
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::INVENTORY_READ])).await?;
    let categories = services
        .repos
        .categories
        .find(tenant.tenant_id(), &BackendQuery::new().order_asc("name"))
        .await?;
    common::list(categories)
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::INVENTORY_READ])).await?;
    let id: CategoryId = parse_id(&id)?;
    common::ok(services.repos.categories.get(tenant.tenant_id(), &id).await?)
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCategory>,
) -> ApiResult {
    let (cmd, _) = authorized(&services, &tenant, &principal, CmdAuth::new(body, &[perms::INVENTORY_WRITE])).await?;
    let id: CategoryId = parse_id(&id)?;
    let tenant_id = tenant.tenant_id();

    let before = services.repos.categories.get(tenant_id, &id).await?;
    let mut category = before.clone();
    category.update(cmd)?;
    let existing = services.repos.categories.list(tenant_id).await?;
    ensure_unique_name(&category, &existing)?;

    let stored = services.repos.categories.save(&category).await?;
    services
        .audit(&tenant, &principal, AuditAction::Update, tables::CATEGORIES, id, Some(&before), Some(&stored))
        .await;
    common::ok(stored)
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authorized(&services, &tenant, &principal, CmdAuth::new((), &[perms::INVENTORY_WRITE])).await?;
    let id: CategoryId = parse_id(&id)?;
    let tenant_id = tenant.tenant_id();

    let category = services.repos.categories.get(tenant_id, &id).await?;
    let in_use = services
        .repos
        .items
        .find(tenant_id, &BackendQuery::new().eq("category_id", id).limit(1))
        .await?;
    if !in_use.is_empty() {
        return Err(DomainError::conflict(format!("category '{}' still has items", category.name)).into());
    }

    services.repos.categories.delete(tenant_id, &id).await?;
    services
        .audit(&tenant, &principal, AuditAction::Delete, tables::CATEGORIES, id, Some(&category), None)
        .await;
    Ok(StatusCode::NO_CONTENT.into_response())
}
