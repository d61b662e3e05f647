//! Typed access to backend tables.

use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use proventory_core::{Entity, TenantId, TenantScoped};
use proventory_audit::AuditEntry;
use proventory_auth::RoleRecord;
use proventory_inventory::{Category, Item};
use proventory_notifications::Notification;
use proventory_parties::{Party, PartyKind};
use proventory_purchasing::{PurchaseOrder, PurchaseReturn, WorkflowConfig, WorkflowModule};

use crate::backend::{Backend, Query};
use crate::error::BackendError;

/// Table names as the backend knows them.
pub mod tables {
    pub const ITEMS: &str = "items";
    pub const CATEGORIES: &str = "categories";
    pub const SUPPLIERS: &str = "suppliers";
    pub const CUSTOMERS: &str = "customers";
    pub const PURCHASE_ORDERS: &str = "purchase_orders";
    pub const PURCHASE_RETURNS: &str = "purchase_returns";
    pub const WORKFLOWS: &str = "approval_workflows";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const AUDIT_LOGS: &str = "audit_logs";
    pub const ROLES: &str = "roles";

    /// Columns that are unique per tenant, besides `id`.
    pub fn unique_columns(table: &str) -> &'static [&'static str] {
        match table {
            PURCHASE_ORDERS => &["po_number"],
            PURCHASE_RETURNS => &["return_number"],
            _ => &[],
        }
    }
}

fn decode<T: DeserializeOwned>(row: JsonValue) -> Result<T, BackendError> {
    Ok(serde_json::from_value(row)?)
}

/// Repository over one table holding records of type `T`.
pub struct Repository<T> {
    backend: Arc<dyn Backend>,
    table: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            table: self.table,
            _marker: PhantomData,
        }
    }
}

impl<T> Repository<T>
where
    T: TenantScoped + Serialize + DeserializeOwned,
    T::Id: Display,
{
    pub fn new(backend: Arc<dyn Backend>, table: &'static str) -> Self {
        Self {
            backend,
            table,
            _marker: PhantomData,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub async fn list(&self, tenant_id: TenantId) -> Result<Vec<T>, BackendError> {
        self.find(tenant_id, &Query::new()).await
    }

    pub async fn find(&self, tenant_id: TenantId, query: &Query) -> Result<Vec<T>, BackendError> {
        self.backend
            .select(tenant_id, self.table, query)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn get(&self, tenant_id: TenantId, id: &T::Id) -> Result<T, BackendError> {
        let id = id.to_string();
        let query = Query::new().eq("id", &id).limit(1);
        let row = self
            .backend
            .select(tenant_id, self.table, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(self.table, id))?;
        decode(row)
    }

    pub async fn insert(&self, record: &T) -> Result<T, BackendError> {
        let row = serde_json::to_value(record)?;
        decode(self.backend.insert(record.tenant_id(), self.table, row).await?)
    }

    /// Writes every column of `record`.
    pub async fn save(&self, record: &T) -> Result<T, BackendError> {
        let row = serde_json::to_value(record)?;
        let id = record.id().to_string();
        decode(self.backend.update(record.tenant_id(), self.table, &id, row).await?)
    }

    pub async fn delete(&self, tenant_id: TenantId, id: &T::Id) -> Result<(), BackendError> {
        self.backend.delete(tenant_id, self.table, &id.to_string()).await
    }
}

/// Approval workflow configuration, one row per module keyed by module name.
#[derive(Clone)]
pub struct WorkflowRepository {
    backend: Arc<dyn Backend>,
}

impl WorkflowRepository {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Stored configuration, or the single-level admin default.
    pub async fn get(&self, tenant_id: TenantId, module: WorkflowModule) -> Result<WorkflowConfig, BackendError> {
        let query = Query::new().eq("id", module.as_str()).limit(1);
        let row = self
            .backend
            .select(tenant_id, tables::WORKFLOWS, &query)
            .await?
            .into_iter()
            .next();
        match row {
            Some(row) => decode(row),
            None => Ok(WorkflowConfig::default_for(module)),
        }
    }

    pub async fn put(&self, tenant_id: TenantId, config: &WorkflowConfig) -> Result<WorkflowConfig, BackendError> {
        let id = config.module.as_str();
        let mut row = serde_json::to_value(config)?;
        if let Some(obj) = row.as_object_mut() {
            obj.insert("id".to_string(), JsonValue::String(id.to_string()));
        }

        let exists = !self
            .backend
            .select(tenant_id, tables::WORKFLOWS, &Query::new().eq("id", id).limit(1))
            .await?
            .is_empty();
        let stored = if exists {
            self.backend.update(tenant_id, tables::WORKFLOWS, id, row).await?
        } else {
            self.backend.insert(tenant_id, tables::WORKFLOWS, row).await?
        };
        decode(stored)
    }
}

/// Every typed repository the application uses, over one backend.
#[derive(Clone)]
pub struct Repositories {
    pub items: Repository<Item>,
    pub categories: Repository<Category>,
    pub suppliers: Repository<Party>,
    pub customers: Repository<Party>,
    pub orders: Repository<PurchaseOrder>,
    pub returns: Repository<PurchaseReturn>,
    pub workflows: WorkflowRepository,
    pub notifications: Repository<Notification>,
    pub audit: Repository<AuditEntry>,
    pub roles: Repository<RoleRecord>,
}

impl Repositories {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            items: Repository::new(backend.clone(), tables::ITEMS),
            categories: Repository::new(backend.clone(), tables::CATEGORIES),
            suppliers: Repository::new(backend.clone(), tables::SUPPLIERS),
            customers: Repository::new(backend.clone(), tables::CUSTOMERS),
            orders: Repository::new(backend.clone(), tables::PURCHASE_ORDERS),
            returns: Repository::new(backend.clone(), tables::PURCHASE_RETURNS),
            workflows: WorkflowRepository::new(backend.clone()),
            notifications: Repository::new(backend.clone(), tables::NOTIFICATIONS),
            audit: Repository::new(backend.clone(), tables::AUDIT_LOGS),
            roles: Repository::new(backend, tables::ROLES),
        }
    }

    pub fn parties(&self, kind: PartyKind) -> &Repository<Party> {
        match kind {
            PartyKind::Supplier => &self.suppliers,
            PartyKind::Customer => &self.customers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use chrono::Utc;
    use proventory_inventory::{CreateItem, ItemId};
    use proventory_purchasing::WorkflowLevel;

    fn item(tenant_id: TenantId, sku: &str) -> Item {
        Item::create(
            tenant_id,
            CreateItem {
                sku: sku.to_string(),
                name: "Widget".to_string(),
                description: None,
                category_id: None,
                unit: "pcs".to_string(),
                quantity: 4,
                reorder_level: 2,
                unit_cost: 100,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn typed_round_trip_through_backend() {
        let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::default());
        let repo: Repository<Item> = Repository::new(backend, tables::ITEMS);
        let t = TenantId::new();

        let mut stored = repo.insert(&item(t, "W-1")).await.unwrap();
        stored.quantity = 9;
        repo.save(&stored).await.unwrap();

        let fetched = repo.get(t, &stored.id).await.unwrap();
        assert_eq!(fetched.quantity, 9);
        assert_eq!(repo.list(t).await.unwrap().len(), 1);
        assert!(repo.list(TenantId::new()).await.unwrap().is_empty());

        repo.delete(t, &stored.id).await.unwrap();
        let err = repo.get(t, &ItemId::generate()).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn workflow_defaults_until_configured() {
        let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::default());
        let repo = WorkflowRepository::new(backend);
        let t = TenantId::new();

        let default = repo.get(t, WorkflowModule::PurchaseOrder).await.unwrap();
        assert_eq!(default, WorkflowConfig::default_for(WorkflowModule::PurchaseOrder));

        let two_level = WorkflowConfig::new(
            WorkflowModule::PurchaseOrder,
            vec![
                WorkflowLevel { level: 1, approver_role: "manager".to_string() },
                WorkflowLevel { level: 2, approver_role: "finance".to_string() },
            ],
        )
        .unwrap();
        repo.put(t, &two_level).await.unwrap();
        repo.put(t, &two_level).await.unwrap();
        assert_eq!(repo.get(t, WorkflowModule::PurchaseOrder).await.unwrap(), two_level);
        assert_eq!(
            repo.get(t, WorkflowModule::PurchaseReturn).await.unwrap(),
            WorkflowConfig::default_for(WorkflowModule::PurchaseReturn)
        );
    }
}
