use serde::{Deserialize, Serialize};

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReviewStatus {
    PENDING,
    APPROVED,
    EDIT,
    REJECTED,
}

impl ReviewStatus {
    /// APPROVED and REJECTED are the only statuses that reach the audit sink.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewStatus::APPROVED | ReviewStatus::REJECTED)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::PENDING => "PENDING",
            ReviewStatus::APPROVED => "APPROVED",
            ReviewStatus::EDIT => "EDIT",
            ReviewStatus::REJECTED => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Edit,
    Reject,
}

/// Follow-up instructions the clinician is drafting before deciding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowUp {
    pub next_ultrasound: Option<String>,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewDecision {
    pub status: ReviewStatus,
    pub notes: String,
    pub next_ultrasound: Option<String>,
    pub decided_at: Option<String>, // RFC3339 UTC, None while PENDING
}

impl ReviewDecision {
    pub fn pending() -> Self {
        Self {
            status: ReviewStatus::PENDING,
            notes: String::new(),
            next_ultrasound: None,
            decided_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    ProduceReport,
    ComposeMessage,
    RecordAudit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub decision: ReviewDecision,
    pub effects: Vec<SideEffect>,
}

/// Apply one clinician action to the current decision.
///
/// Returns the new decision plus the side effects the caller must run, in order.
/// Repeating the action that produced the current terminal status is a re-render of
/// the same decision and yields no effects.
pub fn transition(
    current: &ReviewDecision,
    action: ReviewAction,
    follow_up: &FollowUp,
    decided_at: &str,
) -> Transition {
    let (status, effects) = match (current.status, action) {
        (ReviewStatus::APPROVED, ReviewAction::Approve)
        | (ReviewStatus::REJECTED, ReviewAction::Reject) => {
            return Transition {
                decision: current.clone(),
                effects: Vec::new(),
            };
        }
        (_, ReviewAction::Approve) => (
            ReviewStatus::APPROVED,
            vec![
                SideEffect::ProduceReport,
                SideEffect::ComposeMessage,
                SideEffect::RecordAudit,
            ],
        ),
        (_, ReviewAction::Reject) => (ReviewStatus::REJECTED, vec![SideEffect::RecordAudit]),
        (_, ReviewAction::Edit) => (ReviewStatus::EDIT, Vec::new()),
    };

    Transition {
        decision: ReviewDecision {
            status,
            notes: follow_up.notes.clone(),
            next_ultrasound: follow_up.next_ultrasound.clone(),
            decided_at: Some(decided_at.to_string()),
        },
        effects,
    }
}
