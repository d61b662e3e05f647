use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use proventory_core::{DomainError, Entity, TenantId, TenantScoped, ValidationErrors};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern")
});

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 \-]*$").expect("valid phone pattern"));

proventory_core::record_id!(
    /// Party identifier (supplier or customer).
    PartyId
);

/// Party kind: customer or supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Supplier,
}

impl PartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyKind::Customer => "customer",
            PartyKind::Supplier => "supplier",
        }
    }
}

/// Party status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Suspended,
}

/// Contact information for a party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ContactInfo {
    fn normalized(self) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            email: clean(self.email),
            phone: clean(self.phone),
            address: clean(self.address),
        }
    }

    fn validate_into(&self, errors: &mut ValidationErrors) {
        if let Some(email) = &self.email {
            errors.check(!EMAIL_PATTERN.is_match(email), "contact.email", "is not a valid email address");
        }
        if let Some(phone) = &self.phone {
            let digits = phone.chars().filter(char::is_ascii_digit).count();
            errors.check(
                !PHONE_PATTERN.is_match(phone) || !(7..=20).contains(&digits),
                "contact.phone",
                "must be 7-20 digits, optionally with '+', spaces or dashes",
            );
        }
    }
}

/// Supplier or customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub tenant_id: TenantId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    pub status: PartyStatus,
    pub suspension_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Command: RegisterParty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParty {
    pub name: String,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
}

/// Command: UpdateDetails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    /// Optional new name (if None, keep existing).
    pub name: Option<String>,
    /// Optional new contact info (if None, keep existing).
    pub contact: Option<ContactInfo>,
}

/// Command: SuspendParty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendParty {
    /// Optional human-readable reason for suspension.
    pub reason: Option<String>,
}

impl Party {
    pub fn register(
        tenant_id: TenantId,
        kind: PartyKind,
        cmd: RegisterParty,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let party = Self {
            id: PartyId::generate(),
            tenant_id,
            kind,
            name: cmd.name.trim().to_string(),
            contact: cmd.contact.unwrap_or_default().normalized(),
            status: PartyStatus::Active,
            suspension_reason: None,
            created_at: now,
            updated_at: now,
        };
        party.validate()?;
        Ok(party)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(self.name.is_empty(), "name", "is required");
        errors.check(self.name.chars().count() > 120, "name", "must be at most 120 characters");
        self.contact.validate_into(&mut errors);
        errors.into_result()
    }

    pub fn update(&mut self, cmd: UpdateDetails, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status == PartyStatus::Suspended {
            return Err(DomainError::invariant("suspended parties cannot be modified"));
        }
        let mut next = self.clone();
        if let Some(name) = cmd.name {
            next.name = name.trim().to_string();
        }
        if let Some(contact) = cmd.contact {
            next.contact = contact.normalized();
        }
        next.validate()?;
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    pub fn suspend(&mut self, cmd: SuspendParty, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status == PartyStatus::Suspended {
            return Err(DomainError::conflict("party is already suspended"));
        }
        self.status = PartyStatus::Suspended;
        self.suspension_reason = cmd.reason.filter(|r| !r.trim().is_empty());
        self.updated_at = now;
        Ok(())
    }

    /// Invariant helper: whether this party is allowed to transact.
    ///
    /// Suspended parties cannot transact.
    pub fn can_transact(&self) -> bool {
        self.status == PartyStatus::Active
    }

    pub fn ensure_kind(&self, kind: PartyKind) -> Result<(), DomainError> {
        if self.kind != kind {
            return Err(DomainError::not_found());
        }
        Ok(())
    }
}

impl Entity for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Party {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
