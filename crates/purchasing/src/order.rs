use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use proventory_core::{DomainError, Entity, TenantId, TenantScoped, UserId, ValidationErrors};
use proventory_inventory::ItemId;
use proventory_parties::{Party, PartyId, PartyKind};

use crate::approval::{
    ApprovalOutcome, ApprovalStep, Approver, Decision, approval_outcome, display_steps,
    record_decision,
};
use crate::workflow::{WorkflowConfig, WorkflowModule};

proventory_core::record_id!(
    /// Purchase order identifier.
    PurchaseOrderId
);

/// Purchase order status lifecycle.
///
/// `Draft → PendingApproval → Approved → Issued → Received`, with `Rejected`
/// ending the approval phase and `Cancelled` available before approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Issued,
    Received,
    Cancelled,
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub quantity: i64,
    /// Unit cost in minor currency units.
    pub unit_cost: u64,
}

impl OrderLine {
    pub fn total(&self) -> u64 {
        (self.quantity.max(0) as u64).saturating_mul(self.unit_cost)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub item_id: ItemId,
    pub quantity: i64,
    pub unit_cost: u64,
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub supplier_id: PartyId,
    pub lines: Vec<NewOrderLine>,
    #[serde(default)]
    pub expected_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Purchase order record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub tenant_id: TenantId,
    pub po_number: String,
    pub supplier_id: PartyId,
    pub status: PurchaseOrderStatus,
    pub lines: Vec<OrderLine>,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub approval_steps: Vec<ApprovalStep>,
}

impl PurchaseOrder {
    pub fn create(
        tenant_id: TenantId,
        po_number: String,
        supplier: &Party,
        cmd: CreatePurchaseOrder,
        created_by: (UserId, &str),
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if supplier.id != cmd.supplier_id || supplier.kind != PartyKind::Supplier {
            return Err(DomainError::validation("supplier_id does not refer to a supplier"));
        }
        if !supplier.can_transact() {
            return Err(DomainError::invariant("supplier is suspended"));
        }

        let mut errors = ValidationErrors::new();
        errors.check(cmd.lines.is_empty(), "lines", "at least one line is required");
        for (i, line) in cmd.lines.iter().enumerate() {
            errors.check(
                line.quantity <= 0,
                &format!("lines[{i}].quantity"),
                "must be greater than zero",
            );
        }
        errors.into_result()?;

        let (user_id, user_name) = created_by;
        Ok(Self {
            id: PurchaseOrderId::generate(),
            tenant_id,
            po_number,
            supplier_id: cmd.supplier_id,
            status: PurchaseOrderStatus::Draft,
            lines: cmd
                .lines
                .into_iter()
                .enumerate()
                .map(|(i, l)| OrderLine {
                    line_no: i as u32 + 1,
                    item_id: l.item_id,
                    quantity: l.quantity,
                    unit_cost: l.unit_cost,
                })
                .collect(),
            expected_date: cmd.expected_date,
            notes: cmd.notes.filter(|n| !n.trim().is_empty()),
            created_by: user_id,
            created_at: now,
            updated_at: now,
            approval_steps: vec![ApprovalStep::milestone("Created", 1, Some(user_name.to_string()), now)],
        })
    }

    pub fn total(&self) -> u64 {
        self.lines.iter().map(OrderLine::total).fold(0, u64::saturating_add)
    }

    /// Per-level approval view.
    pub fn approvals(&self) -> Vec<ApprovalStep> {
        display_steps(&self.approval_steps)
    }

    fn next_sequence(&self) -> u64 {
        self.approval_steps.iter().map(|s| s.sequence_no).max().unwrap_or(0) + 1
    }

    fn ensure_status(&self, expected: PurchaseOrderStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invariant(format!(
                "cannot {action} a purchase order in status {:?}",
                self.status
            )));
        }
        Ok(())
    }

    /// Send a draft into its approval workflow.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_status(PurchaseOrderStatus::Draft, "submit")?;
        self.status = PurchaseOrderStatus::PendingApproval;
        self.updated_at = now;
        Ok(())
    }

    /// Record an approver's decision and move the order forward when the
    /// workflow completes.
    ///
    /// If `config` already settles the history (levels were removed while the
    /// order waited), the order moves to its final status and no step is
    /// recorded.
    pub fn decide(
        &mut self,
        config: &WorkflowConfig,
        level: u32,
        decision: Decision,
        approver: &Approver,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalOutcome, DomainError> {
        config.ensure_module(WorkflowModule::PurchaseOrder)?;
        self.ensure_status(PurchaseOrderStatus::PendingApproval, "decide on")?;
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

    /// Bring a pending order in line with what its history means under
    /// `config`. Returns the outcome when the order left `PendingApproval`.
    pub fn settle(
        &mut self,
        config: &WorkflowConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<ApprovalOutcome>, DomainError> {
        config.ensure_module(WorkflowModule::PurchaseOrder)?;
        if self.status != PurchaseOrderStatus::PendingApproval {
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
            ApprovalOutcome::Approved => PurchaseOrderStatus::Approved,
            ApprovalOutcome::Rejected { .. } => PurchaseOrderStatus::Rejected,
            ApprovalOutcome::Pending { .. } => return false,
        };
        true
    }

    /// Mark an approved order as sent to the supplier.
    pub fn issue(&mut self, by: &str, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_status(PurchaseOrderStatus::Approved, "issue")?;
        let seq = self.next_sequence();
        self.approval_steps
            .push(ApprovalStep::milestone("Issued", seq, Some(by.to_string()), now));
        self.status = PurchaseOrderStatus::Issued;
        self.updated_at = now;
        Ok(())
    }

    /// Receive all goods. Returns the lines whose quantities enter stock.
    pub fn receive(&mut self, by: &str, now: DateTime<Utc>) -> Result<Vec<OrderLine>, DomainError> {
        self.ensure_status(PurchaseOrderStatus::Issued, "receive")?;
        let seq = self.next_sequence();
        self.approval_steps
            .push(ApprovalStep::milestone("Received", seq, Some(by.to_string()), now));
        self.status = PurchaseOrderStatus::Received;
        self.updated_at = now;
        Ok(self.lines.clone())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        match self.status {
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::PendingApproval => {
                self.status = PurchaseOrderStatus::Cancelled;
                self.updated_at = now;
                Ok(())
            }
            other => Err(DomainError::invariant(format!(
                "cannot cancel a purchase order in status {other:?}"
            ))),
        }
    }

    pub fn ordered_quantity(&self, item_id: ItemId) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.item_id == item_id)
            .map(|l| l.quantity)
            .sum()
    }
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for PurchaseOrder {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
