//! API-side authorization guard for commands.
//!
//! Permissions come from the principal's cached session, which resolves the
//! token's roles through the tenant's role records.

use proventory_auth::{AuthzError, CommandAuthorization, Permission, Principal, TenantMembership, authorize};

use crate::context::{PrincipalContext, TenantContext};

/// Permission names checked by the routes.
pub mod perms {
    pub const INVENTORY_READ: &str = "inventory.read";
    pub const INVENTORY_WRITE: &str = "inventory.write";
    pub const INVENTORY_ADJUST: &str = "inventory.adjust";
    pub const SUPPLIERS_READ: &str = "suppliers.read";
    pub const SUPPLIERS_WRITE: &str = "suppliers.write";
    pub const CUSTOMERS_READ: &str = "customers.read";
    pub const CUSTOMERS_WRITE: &str = "customers.write";
    pub const PURCHASES_READ: &str = "purchases.read";
    pub const PURCHASES_WRITE: &str = "purchases.write";
    pub const PURCHASES_RECEIVE: &str = "purchases.receive";
    pub const WORKFLOWS_MANAGE: &str = "workflows.manage";
    pub const NOTIFICATIONS_SEND: &str = "notifications.send";
    pub const AUDIT_READ: &str = "audit.read";
    pub const ROLES_MANAGE: &str = "roles.manage";
    pub const REPORTS_EXPORT: &str = "reports.export";
}

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** anything is sent to the backend.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permissions: &[Permission],
    command: &C,
) -> Result<(), AuthzError> {
    let membership = TenantMembership {
        tenant_id: tenant.tenant_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions.to_vec(),
    };

    let principal = Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership,
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}
