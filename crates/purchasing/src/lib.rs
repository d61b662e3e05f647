//! Purchasing domain module (purchase orders, purchase returns, approvals).
//!
//! This crate contains business rules for purchasing, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod approval;
pub mod numbering;
pub mod order;
pub mod returns;
pub mod workflow;

pub use approval::{
    ApprovalOutcome, ApprovalStep, Approver, Decision, Trail, approval_outcome, display_steps,
    milestones, next_pending_level, parse_level, record_decision,
};
pub use numbering::{DocumentKind, next_document_number};
pub use order::{
    CreatePurchaseOrder, NewOrderLine, OrderLine, PurchaseOrder, PurchaseOrderId,
    PurchaseOrderStatus,
};
pub use returns::{
    CreatePurchaseReturn, PurchaseReturn, PurchaseReturnId, ReturnLine, ReturnStatus,
    returnable_quantities,
};
pub use workflow::{WorkflowConfig, WorkflowLevel, WorkflowModule};
