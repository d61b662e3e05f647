use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use proventory_core::{DomainError, Entity, TenantId, TenantScoped, ValidationErrors};

proventory_core::record_id!(
    /// Item category identifier.
    CategoryId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Category {
    pub fn create(tenant_id: TenantId, cmd: CreateCategory, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let category = Self {
            id: CategoryId::generate(),
            tenant_id,
            name: cmd.name.trim().to_string(),
            description: cmd.description.filter(|d| !d.trim().is_empty()),
            created_at: now,
        };
        category.validate()?;
        Ok(category)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(self.name.is_empty(), "name", "is required");
        errors.check(self.name.chars().count() > 60, "name", "must be at most 60 characters");
        errors.into_result()
    }

    pub fn update(&mut self, cmd: UpdateCategory) -> Result<(), DomainError> {
        let mut next = self.clone();
        if let Some(name) = cmd.name {
            next.name = name.trim().to_string();
        }
        if let Some(description) = cmd.description {
            next.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Category {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Category names are unique per tenant, ignoring case and surrounding space.
pub fn ensure_unique_name(candidate: &Category, existing: &[Category]) -> Result<(), DomainError> {
    let wanted = candidate.name.trim().to_lowercase();
    let clash = existing
        .iter()
        .filter(|c| c.id != candidate.id)
        .any(|c| c.name.trim().to_lowercase() == wanted);
    if clash {
        return Err(DomainError::conflict(format!(
            "category '{}' already exists",
            candidate.name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str) -> Category {
        Category::create(
            TenantId::new(),
            CreateCategory { name: name.to_string(), description: None },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn duplicate_names_conflict_case_insensitively() {
        let existing = vec![category("Fasteners")];
        let err = ensure_unique_name(&category(" fasteners "), &existing).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn renaming_to_own_name_is_allowed() {
        let c = category("Tools");
        assert!(ensure_unique_name(&c, std::slice::from_ref(&c)).is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = Category::create(
            TenantId::new(),
            CreateCategory { name: "  ".to_string(), description: None },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Fields(_)));
    }
}
