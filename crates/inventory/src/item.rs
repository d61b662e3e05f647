use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use proventory_core::{DomainError, Entity, TenantId, TenantScoped, ValidationErrors};

use crate::category::CategoryId;

static SKU_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,32}$").expect("valid sku pattern"));

proventory_core::record_id!(
    /// Inventory item identifier.
    ItemId
);

/// Stock level classification shown next to every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    Low,
    InStock,
}

/// Inventory item record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub tenant_id: TenantId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub unit: String,
    pub quantity: i64,
    pub reorder_level: i64,
    /// Unit cost in minor currency units.
    pub unit_cost: u64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Command: CreateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub reorder_level: i64,
    #[serde(default)]
    pub unit_cost: u64,
}

fn default_unit() -> String {
    "pcs".to_string()
}

/// Command: UpdateItem (partial update; `None` leaves the field unchanged).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub unit: Option<String>,
    pub reorder_level: Option<i64>,
    pub unit_cost: Option<u64>,
    pub active: Option<bool>,
}

/// Command: AdjustStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub delta: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Item {
    pub fn create(tenant_id: TenantId, cmd: CreateItem, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let item = Self {
            id: ItemId::generate(),
            tenant_id,
            sku: cmd.sku.trim().to_string(),
            name: cmd.name.trim().to_string(),
            description: cmd.description,
            category_id: cmd.category_id,
            unit: cmd.unit,
            quantity: cmd.quantity,
            reorder_level: cmd.reorder_level,
            unit_cost: cmd.unit_cost,
            active: true,
            created_at: now,
            updated_at: now,
        };
        item.validate()?;
        Ok(item)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(!SKU_PATTERN.is_match(&self.sku), "sku", "must be 1-32 letters, digits, '-' or '_'");
        errors.check(self.name.is_empty(), "name", "is required");
        errors.check(self.name.chars().count() > 120, "name", "must be at most 120 characters");
        errors.check(self.unit.trim().is_empty(), "unit", "is required");
        errors.check(self.quantity < 0, "quantity", "cannot be negative");
        errors.check(self.reorder_level < 0, "reorder_level", "cannot be negative");
        errors.into_result()
    }

    pub fn update(&mut self, cmd: UpdateItem, now: DateTime<Utc>) -> Result<(), DomainError> {
        let mut next = self.clone();
        if let Some(name) = cmd.name {
            next.name = name.trim().to_string();
        }
        if let Some(description) = cmd.description {
            next.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(category_id) = cmd.category_id {
            next.category_id = Some(category_id);
        }
        if let Some(unit) = cmd.unit {
            next.unit = unit;
        }
        if let Some(level) = cmd.reorder_level {
            next.reorder_level = level;
        }
        if let Some(cost) = cmd.unit_cost {
            next.unit_cost = cost;
        }
        if let Some(active) = cmd.active {
            next.active = active;
        }
        next.validate()?;
        next.updated_at = now;
        *self = next;
        Ok(())
    }

    /// Apply a signed stock movement.
    pub fn adjust(&mut self, cmd: &AdjustStock, now: DateTime<Utc>) -> Result<(), DomainError> {
        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if !self.active && cmd.delta > 0 {
            return Err(DomainError::invariant("cannot receive stock into an inactive item"));
        }
        let next = self
            .quantity
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::validation("delta out of range"))?;
        if next < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        self.quantity = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn stock_status(&self) -> StockStatus {
        if self.quantity == 0 {
            StockStatus::OutOfStock
        } else if self.quantity <= self.reorder_level {
            StockStatus::Low
        } else {
            StockStatus::InStock
        }
    }

    /// Quantity × unit cost, saturating.
    pub fn stock_value(&self) -> u64 {
        (self.quantity.max(0) as u64).saturating_mul(self.unit_cost)
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for Item {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Active items at or below their reorder level, most urgent first.
pub fn low_stock(items: &[Item]) -> Vec<&Item> {
    let mut low: Vec<&Item> = items
        .iter()
        .filter(|i| i.active && i.stock_status() != StockStatus::InStock)
        .collect();
    low.sort_by_key(|i| (i.quantity - i.reorder_level, i.sku.clone()));
    low
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn create_cmd(sku: &str, quantity: i64, reorder_level: i64) -> CreateItem {
        CreateItem {
            sku: sku.to_string(),
            name: format!("Item {sku}"),
            description: None,
            category_id: None,
            unit: "pcs".to_string(),
            quantity,
            reorder_level,
            unit_cost: 250,
        }
    }

    fn item(sku: &str, quantity: i64, reorder_level: i64) -> Item {
        Item::create(TenantId::new(), create_cmd(sku, quantity, reorder_level), Utc::now()).unwrap()
    }

    #[test]
    fn create_trims_and_validates() {
        let mut cmd = create_cmd("  BOLT-10 ", 5, 2);
        cmd.name = "  Hex bolt ".to_string();
        let item = Item::create(TenantId::new(), cmd, Utc::now()).unwrap();
        assert_eq!(item.sku, "BOLT-10");
        assert_eq!(item.name, "Hex bolt");
        assert!(item.active);
    }

    #[test]
    fn create_reports_all_field_errors() {
        let mut cmd = create_cmd("bad sku!", -1, -3);
        cmd.name = String::new();
        let err = Item::create(TenantId::new(), cmd, Utc::now()).unwrap_err();
        let DomainError::Fields(fields) = err else {
            panic!("expected field errors");
        };
        for f in ["sku", "name", "quantity", "reorder_level"] {
            assert!(fields.field(f).is_some(), "missing error for {f}");
        }
    }

    #[test]
    fn stock_cannot_go_negative() {
        let mut item = item("NUT", 3, 0);
        let err = item.adjust(&AdjustStock { delta: -4, reason: None }, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(item.quantity, 3);
    }

    #[test]
    fn zero_delta_is_rejected() {
        let mut item = item("NUT", 3, 0);
        assert!(item.adjust(&AdjustStock { delta: 0, reason: None }, Utc::now()).is_err());
    }

    #[test]
    fn stock_status_thresholds() {
        assert_eq!(item("A", 0, 5).stock_status(), StockStatus::OutOfStock);
        assert_eq!(item("B", 5, 5).stock_status(), StockStatus::Low);
        assert_eq!(item("C", 6, 5).stock_status(), StockStatus::InStock);
    }

    #[test]
    fn low_stock_orders_by_shortfall_and_skips_inactive() {
        let mut inactive = item("D", 0, 10);
        inactive.active = false;
        let items = vec![item("A", 4, 5), item("B", 0, 10), item("C", 50, 5), inactive];
        let skus: Vec<_> = low_stock(&items).into_iter().map(|i| i.sku.as_str()).collect();
        assert_eq!(skus, vec!["B", "A"]);
    }

    #[test]
    fn failed_update_leaves_item_untouched() {
        let mut item = item("A", 1, 1);
        let before = item.clone();
        let err = item
            .update(UpdateItem { name: Some("   ".to_string()), ..Default::default() }, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Fields(_)));
        assert_eq!(item, before);
    }

    proptest! {
        #[test]
        fn adjustments_never_leave_negative_stock(deltas in proptest::collection::vec(-20i64..20, 0..40)) {
            let mut item = item("P", 10, 2);
            for d in deltas {
                let _ = item.adjust(&AdjustStock { delta: d, reason: None }, Utc::now());
                prop_assert!(item.quantity >= 0);
            }
        }
    }
}
