use crate::error::{CoreError, CoreResult};
use crate::intake::model::{ClinicalCase, Severity};
use crate::review::state::{ReviewDecision, ReviewStatus};
use crate::routing::resolver::Assignment;
use serde::{Deserialize, Serialize};

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditDecision {
    APPROVED,
    REJECTED,
}

/// One terminal decision event. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditRecord {
    pub patient_id: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub department: String,
    pub decision: AuditDecision,
    pub notes: String,
    pub severity: Severity,
    pub ts_utc: String, // RFC3339 UTC string
}

impl AuditRecord {
    pub fn from_decision(
        case: &ClinicalCase,
        assignment: &Assignment,
        decision: &ReviewDecision,
    ) -> CoreResult<Self> {
        let audit_decision = match decision.status {
            ReviewStatus::APPROVED => AuditDecision::APPROVED,
            ReviewStatus::REJECTED => AuditDecision::REJECTED,
            other => {
                return Err(CoreError::ContractViolation(format!(
                    "audit record requested for non-terminal status {}",
                    other.as_str()
                )))
            }
        };
        let ts_utc = decision.decided_at.clone().ok_or_else(|| {
            CoreError::ContractViolation("terminal decision has no timestamp".to_string())
        })?;
        Ok(Self {
            patient_id: case.patient_id().to_string(),
            doctor_id: assignment.doctor_id.clone(),
            doctor_name: assignment.doctor.name.clone(),
            department: assignment.department().to_string(),
            decision: audit_decision,
            notes: decision.notes.clone(),
            severity: case.severity,
            ts_utc,
        })
    }

    /// Identity of the decision event: one record per (patient, decision instant, decision).
    pub fn key(&self) -> (&str, &str, AuditDecision) {
        (&self.patient_id, &self.ts_utc, self.decision)
    }
}
