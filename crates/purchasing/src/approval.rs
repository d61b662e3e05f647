//! Multi-level approval history.
//!
//! Purchase orders and purchase returns share the same approval mechanics: an
//! append-only list of [`ApprovalStep`]s, some tagged with a level ("Approved
//! at Level 2"), some plain milestones ("Created", "Issued"). The functions in
//! this module turn that history into the per-level view shown to approvers and
//! decide who may act next.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use proventory_core::{DomainError, ValidationErrors};

use crate::workflow::WorkflowConfig;

static LEVEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Level (\d+)").expect("valid level pattern"));

/// Outcome recorded on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trail {
    Approved,
    Rejected,
    Pending,
}

/// One entry of an approval history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    /// Free-text label, e.g. "Created" or "Rejected at Level 2".
    pub status: String,
    pub trail: Trail,
    pub sequence_no: u64,
    #[serde(rename = "approvedBy", default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ApprovalStep {
    /// An unleveled history entry such as "Created" or "Issued".
    pub fn milestone(
        label: impl Into<String>,
        sequence_no: u64,
        by: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: label.into(),
            trail: Trail::Approved,
            sequence_no,
            approved_by: by,
            date: Some(at),
            comment: None,
        }
    }

    /// Level parsed from the status label, if any.
    pub fn level(&self) -> Option<u32> {
        parse_level(&self.status)
    }
}

/// Extract `N` from the first "Level N" in a status label.
pub fn parse_level(status: &str) -> Option<u32> {
    LEVEL_PATTERN
        .captures(status)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn latest_per_level(steps: &[ApprovalStep]) -> BTreeMap<u32, &ApprovalStep> {
    let mut latest: BTreeMap<u32, &ApprovalStep> = BTreeMap::new();
    for step in steps {
        let Some(level) = step.level() else { continue };
        latest
            .entry(level)
            .and_modify(|cur| {
                if step.sequence_no >= cur.sequence_no {
                    *cur = step;
                }
            })
            .or_insert(step);
    }
    latest
}

fn first_rejected_level(steps: &[ApprovalStep]) -> Option<u32> {
    steps
        .iter()
        .filter(|s| s.trail == Trail::Rejected)
        .filter_map(ApprovalStep::level)
        .min()
}

/// Display view of an approval history.
///
/// Keeps the latest step (highest `sequence_no`) of every level, ordered by
/// level, and stops right after the lowest level at which any rejection was
/// recorded. Steps without a "Level N" label are not part of this view; see
/// [`milestones`].
pub fn display_steps(steps: &[ApprovalStep]) -> Vec<ApprovalStep> {
    let rejected_at = first_rejected_level(steps);
    latest_per_level(steps)
        .into_iter()
        .take_while(|(level, _)| rejected_at.is_none_or(|r| *level <= r))
        .map(|(_, step)| step.clone())
        .collect()
}

/// Unleveled steps ("Created", "Issued", ...) in sequence order.
pub fn milestones(steps: &[ApprovalStep]) -> Vec<ApprovalStep> {
    let mut out: Vec<ApprovalStep> = steps.iter().filter(|s| s.level().is_none()).cloned().collect();
    out.sort_by_key(|s| s.sequence_no);
    out
}

/// Where a document stands against its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    Pending { level: u32 },
    Approved,
    Rejected { level: u32 },
}

/// The first configured level whose latest step is not an approval.
///
/// `None` once every level is approved, or as soon as anything was rejected.
pub fn next_pending_level(steps: &[ApprovalStep], config: &WorkflowConfig) -> Option<u32> {
    if first_rejected_level(steps).is_some() {
        return None;
    }
    let latest = latest_per_level(steps);
    config
        .level_numbers()
        .find(|level| latest.get(level).is_none_or(|s| s.trail != Trail::Approved))
}

pub fn approval_outcome(steps: &[ApprovalStep], config: &WorkflowConfig) -> ApprovalOutcome {
    if let Some(level) = first_rejected_level(steps) {
        return ApprovalOutcome::Rejected { level };
    }
    match next_pending_level(steps, config) {
        Some(level) => ApprovalOutcome::Pending { level },
        None => ApprovalOutcome::Approved,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// The person recording a decision and the roles they hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approver {
    pub name: String,
    pub roles: Vec<String>,
}

impl Approver {
    fn may_act_as(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role || r == "admin")
    }
}

/// Build the step recording `decision` at `level`.
///
/// Only the next pending level may be decided, only by someone holding that
/// level's approver role, and a rejection must carry a comment. The returned
/// step gets the next sequence number; the caller appends it to the history.
pub fn record_decision(
    steps: &[ApprovalStep],
    config: &WorkflowConfig,
    level: u32,
    decision: Decision,
    approver: &Approver,
    comment: Option<String>,
    now: DateTime<Utc>,
) -> Result<ApprovalStep, DomainError> {
    let comment = comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    if decision == Decision::Reject && comment.is_none() {
        let mut errors = ValidationErrors::new();
        errors.add("comment", "is required when rejecting");
        return Err(errors.into());
    }

    let configured = config
        .level(level)
        .ok_or_else(|| DomainError::validation(format!("level {level} is not configured")))?;

    match next_pending_level(steps, config) {
        Some(next) if next == level => {}
        Some(next) => {
            return Err(DomainError::conflict(format!(
                "level {level} cannot be decided while level {next} is pending"
            )));
        }
        None => return Err(DomainError::conflict("approval workflow is already complete")),
    }

    if !approver.may_act_as(&configured.approver_role) {
        return Err(DomainError::Unauthorized);
    }

    let (trail, verb) = match decision {
        Decision::Approve => (Trail::Approved, "Approved"),
        Decision::Reject => (Trail::Rejected, "Rejected"),
    };
    let sequence_no = steps.iter().map(|s| s.sequence_no).max().unwrap_or(0) + 1;

    Ok(ApprovalStep {
        status: format!("{verb} at Level {level}"),
        trail,
        sequence_no,
        approved_by: Some(approver.name.clone()),
        date: Some(now),
        comment,
    })
}
