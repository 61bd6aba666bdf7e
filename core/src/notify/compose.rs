use crate::error::{CoreError, CoreResult};
use crate::intake::model::{ArtifactRef, ClinicalCase, ClinicalContext};
use crate::review::state::{ReviewDecision, ReviewStatus};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SIGNATURE: &str = "Hospital Care Team";
pub const NO_ULTRASOUND_REQUIRED: &str = "No ultrasound required now";
pub const ANTENATAL_FOLLOW_UP_LINE: &str =
    "Please continue your routine antenatal follow-up as scheduled.";
pub const ROUTINE_FOLLOW_UP_LINE: &str = "Please continue routine follow-up with your care team.";

/// Patient-facing notification. Only ever built for an approved decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientMessage {
    pub body: String,
    pub attachments: Vec<ArtifactRef>,
}

#[derive(Debug, Clone)]
pub struct Composer {
    signature: String,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNATURE)
    }
}

impl Composer {
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
        }
    }

    /// Build the message body and attachment manifest.
    ///
    /// `report` is the doctor-approved report artifact when one was produced; it is listed
    /// after the case's own report references.
    pub fn compose(
        &self,
        case: &ClinicalCase,
        decision: &ReviewDecision,
        followup_notes: &str,
        report: Option<&ArtifactRef>,
    ) -> CoreResult<PatientMessage> {
        if decision.status != ReviewStatus::APPROVED {
            return Err(CoreError::ContractViolation(format!(
                "patient message requested while decision is {}",
                decision.status.as_str()
            )));
        }

        let mut attachments = case.report_artifacts();
        if let Some(r) = report {
            attachments.push(r.clone());
        }

        let mut lines: Vec<String> = vec![
            "Hello,".to_string(),
            String::new(),
            "Your medical report has been reviewed and approved by the doctor.".to_string(),
            String::new(),
            "Summary:".to_string(),
            format!("• Status: {}", case.severity.patient_label()),
            format!("• Risk Level: {}", case.severity.risk_label()),
        ];

        if *case.context() == ClinicalContext::Pregnancy {
            match selected_ultrasound(decision) {
                Some(scan) => lines.push(format!("• Next Ultrasound: {}", scan)),
                None => lines.push(format!("• {}", ANTENATAL_FOLLOW_UP_LINE)),
            }
        }

        for block in case.findings.values() {
            lines.push(format!(
                "• {} findings: {}",
                block.display_name(),
                block.severity().patient_label()
            ));
        }

        lines.push(String::new());
        lines.push("Doctor's instructions:".to_string());
        let notes = followup_notes.trim();
        if notes.is_empty() {
            lines.push(ROUTINE_FOLLOW_UP_LINE.to_string());
        } else {
            lines.push(followup_notes.to_string());
        }

        if !attachments.is_empty() {
            lines.push(String::new());
            lines.push("Please find your doctor-approved report attached.".to_string());
        }
        lines.push(String::new());
        lines.push(format!("— {}", self.signature));

        Ok(PatientMessage {
            body: lines.join("\n"),
            attachments,
        })
    }
}

/// Compose with the default sign-off and no generated report.
pub fn compose(
    case: &ClinicalCase,
    decision: &ReviewDecision,
    followup_notes: &str,
) -> CoreResult<PatientMessage> {
    Composer::default().compose(case, decision, followup_notes, None)
}

fn selected_ultrasound(decision: &ReviewDecision) -> Option<&str> {
    decision
        .next_ultrasound
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != NO_ULTRASOUND_REQUIRED)
}
