use crate::audit::record::{AuditDecision, AuditRecord};
use crate::audit::sink::AuditSink;
use crate::error::{CoreError, CoreResult};
use crate::intake::model::ClinicalCase;
use crate::review::state::ReviewDecision;
use crate::routing::resolver::Assignment;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Written(AuditRecord),
    AlreadyRecorded(AuditRecord),
}

/// Writes at most one record per (patient id, decision timestamp, decision).
pub struct AuditRecorder<S: AuditSink> {
    sink: S,
    recorded: HashSet<(String, String, AuditDecision)>,
}

impl<S: AuditSink> AuditRecorder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            recorded: HashSet::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn record(
        &mut self,
        case: &ClinicalCase,
        assignment: &Assignment,
        decision: &ReviewDecision,
    ) -> CoreResult<RecordOutcome> {
        let record = AuditRecord::from_decision(case, assignment, decision)?;
        self.write(record)
    }

    /// Persist a record built earlier, e.g. one whose first write failed.
    pub fn write(&mut self, record: AuditRecord) -> CoreResult<RecordOutcome> {
        let key = (
            record.patient_id.clone(),
            record.ts_utc.clone(),
            record.decision,
        );
        if self.recorded.contains(&key) || self.sink.contains(&key.0, &key.1, key.2)? {
            tracing::debug!(
                patient_id = %record.patient_id,
                ts_utc = %record.ts_utc,
                "audit record already present, skipping write"
            );
            self.recorded.insert(key);
            return Ok(RecordOutcome::AlreadyRecorded(record));
        }
        self.sink.append(&record).map_err(|e| match e {
            CoreError::AuditSink(msg) => CoreError::AuditSink(msg),
            other => CoreError::AuditSink(other.to_string()),
        })?;
        tracing::info!(
            patient_id = %record.patient_id,
            decision = ?record.decision,
            doctor_id = %record.doctor_id,
            "audit record written"
        );
        self.recorded.insert(key);
        Ok(RecordOutcome::Written(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::sink::MemoryAuditSink;
    use crate::intake::parser::parse_case_record;
    use crate::review::state::{transition, FollowUp, ReviewAction};
    use crate::routing::resolver::resolve;

    fn fixture() -> (ClinicalCase, Assignment) {
        let case = parse_case_record(
            r#"{
                "patient_details": {"patient_id": "PT-3", "clinical_context": "GENERAL"},
                "ordering_doctor": {"name": "Dr. Shah", "department": "Medicine", "available": true},
                "fallback_doctor": {"name": "Dr. Bose", "department": "Medicine"}
            }"#,
        )
        .unwrap();
        let (assignment, _) = resolve(&case.ordering_doctor, &case.fallback_doctor);
        (case, assignment)
    }

    #[test]
    fn second_record_for_same_decision_is_noop() {
        let (case, assignment) = fixture();
        let decision = transition(
            &ReviewDecision::pending(),
            ReviewAction::Reject,
            &FollowUp::default(),
            "2026-04-01T10:00:00Z",
        )
        .decision;
        let mut recorder = AuditRecorder::new(MemoryAuditSink::new());
        let first = recorder.record(&case, &assignment, &decision).unwrap();
        let second = recorder.record(&case, &assignment, &decision).unwrap();
        assert!(matches!(first, RecordOutcome::Written(_)));
        assert!(matches!(second, RecordOutcome::AlreadyRecorded(_)));
        assert_eq!(recorder.sink().all().len(), 1);
    }

    #[test]
    fn pending_decision_is_rejected() {
        let (case, assignment) = fixture();
        let mut recorder = AuditRecorder::new(MemoryAuditSink::new());
        let err = recorder
            .record(&case, &assignment, &ReviewDecision::pending())
            .unwrap_err();
        assert!(matches!(err, CoreError::ContractViolation(_)));
        assert!(recorder.sink().all().is_empty());
    }
}
