use serde::{Deserialize, Serialize};

use proventory_core::{DomainError, ValidationErrors};

pub const MAX_LEVELS: usize = 10;

/// Which document type a workflow governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowModule {
    PurchaseOrder,
    PurchaseReturn,
}

impl WorkflowModule {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowModule::PurchaseOrder => "purchase_order",
            WorkflowModule::PurchaseReturn => "purchase_return",
        }
    }
}

impl core::str::FromStr for WorkflowModule {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase_order" | "purchase-order" => Ok(Self::PurchaseOrder),
            "purchase_return" | "purchase-return" => Ok(Self::PurchaseReturn),
            other => Err(DomainError::validation(format!("unknown workflow module '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowLevel {
    pub level: u32,
    pub approver_role: String,
}

/// Ordered approval levels for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub module: WorkflowModule,
    levels: Vec<WorkflowLevel>,
}

impl WorkflowConfig {
    /// Levels are sorted; they must be numbered 1..=n without gaps.
    pub fn new(module: WorkflowModule, mut levels: Vec<WorkflowLevel>) -> Result<Self, DomainError> {
        levels.sort_by_key(|l| l.level);

        let mut errors = ValidationErrors::new();
        errors.check(levels.is_empty(), "levels", "at least one approval level is required");
        errors.check(levels.len() > MAX_LEVELS, "levels", "at most 10 approval levels are allowed");
        let contiguous = levels
            .iter()
            .enumerate()
            .all(|(i, l)| l.level as usize == i + 1);
        errors.check(!contiguous, "levels", "levels must be numbered 1, 2, 3, ... without gaps");
        for l in &levels {
            errors.check(
                l.approver_role.trim().is_empty(),
                "levels",
                "every level needs an approver role",
            );
        }
        errors.into_result()?;

        Ok(Self { module, levels })
    }

    /// Single-level workflow approved by administrators.
    pub fn default_for(module: WorkflowModule) -> Self {
        Self {
            module,
            levels: vec![WorkflowLevel { level: 1, approver_role: "admin".to_string() }],
        }
    }

    pub fn levels(&self) -> &[WorkflowLevel] {
        &self.levels
    }

    pub fn level(&self, level: u32) -> Option<&WorkflowLevel> {
        self.levels.iter().find(|l| l.level == level)
    }

    pub fn level_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.iter().map(|l| l.level)
    }

    pub fn ensure_module(&self, module: WorkflowModule) -> Result<(), DomainError> {
        if self.module != module {
            return Err(DomainError::invariant(format!(
                "workflow for {} cannot govern {}",
                self.module.as_str(),
                module.as_str()
            )));
        }
        Ok(())
    }
}
