use super::state::{transition, FollowUp, ReviewAction, ReviewDecision, ReviewStatus, SideEffect};
use crate::audit::record::AuditRecord;
use crate::audit::recorder::{AuditRecorder, RecordOutcome};
use crate::audit::sink::AuditSink;
use crate::config::ReviewConfig;
use crate::error::{CoreError, CoreResult};
use crate::intake::model::{ArtifactRef, ClinicalCase};
use crate::notify::channel::NotificationChannel;
use crate::notify::compose::{Composer, PatientMessage};
use crate::report::producer::ReportProducer;
use crate::routing::resolver::{resolve, Assignment};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub const REJECTED_NOTE: &str = "Case routed for further manual review";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    NotRequired,
    Persisted { record: AuditRecord },
    AlreadyRecorded { record: AuditRecord },
    RecordedLocally { record: AuditRecord, error: String },
}

impl AuditStatus {
    pub fn record(&self) -> Option<&AuditRecord> {
        match self {
            AuditStatus::NotRequired => None,
            AuditStatus::Persisted { record }
            | AuditStatus::AlreadyRecorded { record }
            | AuditStatus::RecordedLocally { record, .. } => Some(record),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            AuditStatus::NotRequired => "no audit record required",
            AuditStatus::Persisted { .. } => "decision recorded",
            AuditStatus::AlreadyRecorded { .. } => "decision already recorded",
            AuditStatus::RecordedLocally { .. } => "recorded locally but not yet persisted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Delivered { delivery_id: String },
    AlreadyDelivered { delivery_id: String },
    Failed { error: String },
}

/// What a clinician action changed, for the caller to render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub decision: ReviewDecision,
    pub message: Option<PatientMessage>,
    pub report: Option<ArtifactRef>,
    pub audit: AuditStatus,
    pub warnings: Vec<String>,
    pub note: Option<String>,
}

/// One clinician reviewing one case. Holds every per-session flag; no global state.
pub struct ReviewSession {
    session_id: String,
    case: ClinicalCase,
    assignment: Assignment,
    decision: ReviewDecision,
    follow_up: FollowUp,
    composer: Composer,
    config: ReviewConfig,
    report: Option<ArtifactRef>,
    message: Option<PatientMessage>,
    audit: AuditStatus,
    pending_audit: Vec<AuditRecord>,
    delivery_id: Option<String>,
    last_warnings: Vec<String>,
}

impl ReviewSession {
    pub fn open(case: ClinicalCase, config: &ReviewConfig) -> Self {
        let (assignment, reason) = resolve(&case.ordering_doctor, &case.fallback_doctor);
        let session_id = format!("s_{}", Ulid::new());
        tracing::info!(
            session_id = %session_id,
            patient_id = %case.patient_id(),
            doctor_id = %assignment.doctor_id,
            reason = reason.describe(),
            "review session opened"
        );

        let next_ultrasound = case
            .preset_next_ultrasound
            .clone()
            .filter(|scan| config.validate_ultrasound(scan).is_ok());
        let follow_up = FollowUp {
            next_ultrasound,
            notes: case.preset_notes.clone(),
        };

        Self {
            session_id,
            assignment,
            decision: ReviewDecision::pending(),
            follow_up,
            composer: Composer::new(config.care_team_signature.clone()),
            config: config.clone(),
            report: None,
            message: None,
            audit: AuditStatus::NotRequired,
            pending_audit: Vec::new(),
            delivery_id: None,
            last_warnings: Vec::new(),
            case,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn case(&self) -> &ClinicalCase {
        &self.case
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn decision(&self) -> &ReviewDecision {
        &self.decision
    }

    pub fn follow_up(&self) -> &FollowUp {
        &self.follow_up
    }

    pub fn message(&self) -> Option<&PatientMessage> {
        self.message.as_ref()
    }

    /// Records whose write failed and still need to reach the sink.
    pub fn pending_audit(&self) -> &[AuditRecord] {
        &self.pending_audit
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.follow_up.notes = notes.into();
    }

    pub fn select_next_ultrasound(&mut self, selection: Option<&str>) -> CoreResult<()> {
        match selection {
            Some(scan) => {
                self.config.validate_ultrasound(scan)?;
                self.follow_up.next_ultrasound = Some(scan.to_string());
            }
            None => self.follow_up.next_ultrasound = None,
        }
        Ok(())
    }

    pub fn apply<S: AuditSink>(
        &mut self,
        action: ReviewAction,
        recorder: &mut AuditRecorder<S>,
        reports: &dyn ReportProducer,
    ) -> CoreResult<ReviewOutcome> {
        let now = now_rfc3339_utc()?;
        self.apply_at(action, &now, recorder, reports)
    }

    /// Same as `apply`, with the decision instant supplied by the caller.
    pub fn apply_at<S: AuditSink>(
        &mut self,
        action: ReviewAction,
        decided_at: &str,
        recorder: &mut AuditRecorder<S>,
        reports: &dyn ReportProducer,
    ) -> CoreResult<ReviewOutcome> {
        let t = transition(&self.decision, action, &self.follow_up, decided_at);
        if t.effects.is_empty() && t.decision == self.decision {
            tracing::debug!(session_id = %self.session_id, ?action, "decision re-rendered, nothing to do");
            return Ok(self.outcome());
        }

        let decision = t.decision;
        tracing::info!(
            session_id = %self.session_id,
            patient_id = %self.case.patient_id(),
            from = self.decision.status.as_str(),
            to = decision.status.as_str(),
            "review decision changed"
        );

        let mut warnings = Vec::new();
        let mut report = None;
        let mut message = None;
        let mut audit = AuditStatus::NotRequired;

        for effect in &t.effects {
            match effect {
                SideEffect::ProduceReport => {
                    match reports.produce(&self.case, &self.assignment, &decision) {
                        Ok(artifact) => report = Some(artifact),
                        Err(e) => {
                            tracing::warn!(session_id = %self.session_id, error = %e, "report artifact failed");
                            warnings.push(format!("report artifact not produced: {}", e));
                        }
                    }
                }
                SideEffect::ComposeMessage => {
                    match self.composer.compose(
                        &self.case,
                        &decision,
                        &decision.notes,
                        report.as_ref(),
                    ) {
                        Ok(m) => message = Some(m),
                        Err(e) => {
                            tracing::warn!(session_id = %self.session_id, error = %e, "message composition failed");
                            warnings.push(format!("patient message not composed: {}", e));
                        }
                    }
                }
                SideEffect::RecordAudit => {
                    let record =
                        AuditRecord::from_decision(&self.case, &self.assignment, &decision)?;
                    audit = self.persist(recorder, record);
                }
            }
        }

        self.decision = decision;
        self.report = report;
        self.message = message;
        self.audit = audit;
        self.delivery_id = None;
        self.last_warnings = warnings;
        Ok(self.outcome())
    }

    /// Hand the composed message to a channel. Failure is reported, never rolled back.
    pub fn deliver(&mut self, channel: &dyn NotificationChannel) -> CoreResult<DeliveryStatus> {
        if self.decision.status != ReviewStatus::APPROVED {
            return Err(CoreError::ContractViolation(format!(
                "delivery requested while decision is {}",
                self.decision.status.as_str()
            )));
        }
        let message = self.message.as_ref().ok_or_else(|| {
            CoreError::ContractViolation("approved decision has no composed message".to_string())
        })?;
        if let Some(id) = &self.delivery_id {
            return Ok(DeliveryStatus::AlreadyDelivered {
                delivery_id: id.clone(),
            });
        }
        match channel.send(&message.body, &message.attachments) {
            Ok(delivery_id) => {
                tracing::info!(
                    session_id = %self.session_id,
                    channel = channel.name(),
                    delivery_id = %delivery_id,
                    "patient message delivered"
                );
                self.delivery_id = Some(delivery_id.clone());
                Ok(DeliveryStatus::Delivered { delivery_id })
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, channel = channel.name(), error = %e, "delivery failed");
                Ok(DeliveryStatus::Failed {
                    error: e.to_string(),
                })
            }
        }
    }

    /// Re-attempt audit writes that previously failed. Returns how many are still pending.
    pub fn retry_pending_audit<S: AuditSink>(&mut self, recorder: &mut AuditRecorder<S>) -> usize {
        let pending = std::mem::take(&mut self.pending_audit);
        for record in pending {
            let status = self.persist(recorder, record);
            let same_event = self.audit.record().map(AuditRecord::key)
                == status.record().map(AuditRecord::key);
            if same_event {
                self.audit = status;
            }
        }
        self.pending_audit.len()
    }

    fn persist<S: AuditSink>(
        &mut self,
        recorder: &mut AuditRecorder<S>,
        record: AuditRecord,
    ) -> AuditStatus {
        match recorder.write(record.clone()) {
            Ok(RecordOutcome::Written(record)) => AuditStatus::Persisted { record },
            Ok(RecordOutcome::AlreadyRecorded(record)) => AuditStatus::AlreadyRecorded { record },
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    patient_id = %record.patient_id,
                    error = %e,
                    "audit sink unavailable, keeping record in session"
                );
                self.pending_audit.push(record.clone());
                AuditStatus::RecordedLocally {
                    record,
                    error: e.to_string(),
                }
            }
        }
    }

    fn outcome(&self) -> ReviewOutcome {
        ReviewOutcome {
            decision: self.decision.clone(),
            message: self.message.clone(),
            report: self.report.clone(),
            audit: self.audit.clone(),
            warnings: self.last_warnings.clone(),
            note: (self.decision.status == ReviewStatus::REJECTED)
                .then(|| REJECTED_NOTE.to_string()),
        }
    }
}

pub fn now_rfc3339_utc() -> CoreResult<String> {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|e| CoreError::InvalidInput(format!("timestamp formatting failed: {}", e)))
}
