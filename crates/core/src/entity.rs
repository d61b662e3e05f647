//! Entity traits: identity + tenant ownership.

use crate::id::TenantId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// A record that belongs to exactly one tenant.
///
/// The backend enforces tenant isolation on every query; records carry their
/// tenant so repositories can assert it on the way in and out.
pub trait TenantScoped: Entity {
    fn tenant_id(&self) -> TenantId;
}
