use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use proventory_core::{DomainError, Entity, TenantId, TenantScoped, UserId, ValidationErrors};
use proventory_inventory::ItemId;
use proventory_parties::PartyId;

use crate::approval::{
    ApprovalOutcome, ApprovalStep, Approver, Decision, approval_outcome, display_steps,
    record_decision,
};
use crate::order::{PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus};
use crate::workflow::{WorkflowConfig, WorkflowModule};

proventory_core::record_id!(
    /// Purchase return identifier.
    PurchaseReturnId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    PendingApproval,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub item_id: ItemId,
    pub quantity: i64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseReturn {
    pub order_id: PurchaseOrderId,
    pub lines: Vec<ReturnLine>,
}

/// Goods sent back to a supplier against a received purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReturn {
    pub id: PurchaseReturnId,
    pub tenant_id: TenantId,
    pub return_number: String,
    pub order_id: PurchaseOrderId,
    pub supplier_id: PartyId,
    pub status: ReturnStatus,
    pub lines: Vec<ReturnLine>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub approval_steps: Vec<ApprovalStep>,
}

/// Quantities per item still eligible for return on `order`.
///
/// Returns that were rejected do not consume quantity.
pub fn returnable_quantities(
    order: &PurchaseOrder,
    existing: &[PurchaseReturn],
) -> BTreeMap<ItemId, i64> {
    let mut remaining: BTreeMap<ItemId, i64> = BTreeMap::new();
    for line in &order.lines {
        *remaining.entry(line.item_id).or_default() += line.quantity;
    }
    for ret in existing
        .iter()
        .filter(|r| r.order_id == order.id && r.status != ReturnStatus::Rejected)
    {
        for line in &ret.lines {
            if let Some(q) = remaining.get_mut(&line.item_id) {
                *q -= line.quantity;
            }
        }
    }
    remaining
}

impl PurchaseReturn {
    /// Open a return; it enters approval immediately.
    pub fn create(
        tenant_id: TenantId,
        return_number: String,
        order: &PurchaseOrder,
        existing: &[PurchaseReturn],
        cmd: CreatePurchaseReturn,
        created_by: (UserId, &str),
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if cmd.order_id != order.id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        if order.status != PurchaseOrderStatus::Received {
            return Err(DomainError::invariant("only received purchase orders can be returned"));
        }

        let remaining = returnable_quantities(order, existing);
        let mut requested: BTreeMap<ItemId, i64> = BTreeMap::new();
        let mut errors = ValidationErrors::new();
        errors.check(cmd.lines.is_empty(), "lines", "at least one line is required");
        for (i, line) in cmd.lines.iter().enumerate() {
            let field = |name: &str| format!("lines[{i}].{name}");
            errors.check(line.quantity <= 0, &field("quantity"), "must be greater than zero");
            errors.check(line.reason.trim().is_empty(), &field("reason"), "is required");
            match remaining.get(&line.item_id) {
                None => errors.add(field("item_id"), "is not on the purchase order"),
                Some(left) => {
                    let total = requested.entry(line.item_id).or_default();
                    *total += line.quantity.max(0);
                    errors.check(*total > *left, &field("quantity"), "exceeds the returnable quantity");
                }
            }
        }
        errors.into_result()?;

        let (user_id, user_name) = created_by;
        Ok(Self {
            id: PurchaseReturnId::generate(),
            tenant_id,
            return_number,
            order_id: order.id,
            supplier_id: order.supplier_id,
            status: ReturnStatus::PendingApproval,
            lines: cmd.lines,
            created_by: user_id,
            created_at: now,
            updated_at: now,
            approval_steps: vec![ApprovalStep::milestone("Created", 1, Some(user_name.to_string()), now)],
        })
    }

    pub fn approvals(&self) -> Vec<ApprovalStep> {
        display_steps(&self.approval_steps)
    }

    /// Same contract as [`PurchaseOrder::decide`], including settling a
    /// return whose history the current workflow already completes.
    pub fn decide(
        &mut self,
        config: &WorkflowConfig,
        level: u32,
        decision: Decision,
        approver: &Approver,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalOutcome, DomainError> {
        config.ensure_module(WorkflowModule::PurchaseReturn)?;
        if self.status != ReturnStatus::PendingApproval {
            return Err(DomainError::invariant("purchase return is no longer pending approval"));
        }
        if let Some(outcome) = self.settle(config, now)? {
            return Ok(outcome);
        }

        let step = record_decision(&self.approval_steps, config, level, decision, approver, comment, now)?;
        self.approval_steps.push(step);

        let outcome = approval_outcome(&self.approval_steps, config);
        self.apply_outcome(outcome);
        self.updated_at = now;
        Ok(outcome)
    }

    /// Returns the outcome when the return left `PendingApproval`.
    pub fn settle(
        &mut self,
        config: &WorkflowConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<ApprovalOutcome>, DomainError> {
        config.ensure_module(WorkflowModule::PurchaseReturn)?;
        if self.status != ReturnStatus::PendingApproval {
            return Ok(None);
        }
        let outcome = approval_outcome(&self.approval_steps, config);
        if !self.apply_outcome(outcome) {
            return Ok(None);
        }
        self.updated_at = now;
        Ok(Some(outcome))
    }

    fn apply_outcome(&mut self, outcome: ApprovalOutcome) -> bool {
        self.status = match outcome {
            ApprovalOutcome::Approved => ReturnStatus::Approved,
            ApprovalOutcome::Rejected { .. } => ReturnStatus::Rejected,
            ApprovalOutcome::Pending { .. } => return false,
        };
        true
    }

    /// Stock movements (negative deltas) once the return is approved.
    pub fn stock_movements(&self) -> Vec<(ItemId, i64)> {
        if self.status != ReturnStatus::Approved {
            return Vec::new();
        }
        self.lines.iter().map(|l| (l.item_id, -l.quantity)).collect()
    }
}

impl Entity for PurchaseReturn {
    type Id = PurchaseReturnId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for PurchaseReturn {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
