use std::borrow::Cow;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use proventory_core::{DomainError, Entity, TenantId, TenantScoped, ValidationErrors};

use crate::Permission;

/// Role identifier used for RBAC.
///
/// Roles are opaque names at this layer; mapping roles to permissions is done
/// through [`RoleRecord`]s managed by tenant administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Built-in role that always grants the wildcard permission.
    pub const ADMIN: &'static str = "admin";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_admin(&self) -> bool {
        self.as_str() == Self::ADMIN
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

proventory_core::record_id!(
    /// Role management record identifier.
    RoleRecordId
);

/// A tenant-defined role and the permissions it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleRecordId,
    pub tenant_id: TenantId,
    pub name: Role,
    pub description: Option<String>,
    pub permissions: BTreeSet<Permission>,
    pub updated_at: DateTime<Utc>,
}

impl RoleRecord {
    pub fn new(
        tenant_id: TenantId,
        name: Role,
        description: Option<String>,
        permissions: impl IntoIterator<Item = Permission>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let record = Self {
            id: RoleRecordId::generate(),
            tenant_id,
            name,
            description,
            permissions: permissions.into_iter().collect(),
            updated_at: now,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = self.name.as_str();
        errors.check(name.trim().is_empty(), "name", "is required");
        errors.check(name.len() > 50, "name", "must be at most 50 characters");
        errors.check(
            !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'),
            "name",
            "may only contain lowercase letters, digits, '-' and '_'",
        );
        for p in &self.permissions {
            if !p.is_well_formed() {
                errors.add("permissions", format!("'{p}' is not a valid permission"));
            }
        }
        errors.into_result()
    }

    /// Replace the permission set. The built-in admin role cannot be narrowed.
    pub fn set_permissions(
        &mut self,
        permissions: impl IntoIterator<Item = Permission>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.name.is_admin() {
            return Err(DomainError::invariant("the admin role's permissions are fixed"));
        }
        self.permissions = permissions.into_iter().collect();
        self.updated_at = now;
        self.validate()?;
        Ok(())
    }
}

impl Entity for RoleRecord {
    type Id = RoleRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for RoleRecord {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Resolve the permissions granted by `roles` given the tenant's role records.
///
/// `admin` always resolves to the wildcard; roles without a record grant nothing.
pub fn effective_permissions(roles: &[Role], records: &[RoleRecord]) -> Vec<Permission> {
    if roles.iter().any(Role::is_admin) {
        return vec![Permission::wildcard()];
    }

    let mut perms = BTreeSet::new();
    for role in roles {
        if let Some(record) = records.iter().find(|r| &r.name == role) {
            perms.extend(record.permissions.iter().cloned());
        }
    }
    perms.into_iter().collect()
}
