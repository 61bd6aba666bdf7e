use review_core::audit::record::{AuditDecision, AuditRecord};
use review_core::audit::recorder::{AuditRecorder, RecordOutcome};
use review_core::audit::sink::{AuditSink, NdjsonAuditSink};
use review_core::intake::model::Severity;

fn record(pid: &str, decision: AuditDecision, ts: &str) -> AuditRecord {
    AuditRecord {
        patient_id: pid.to_string(),
        doctor_id: "dr_0011223344556677".to_string(),
        doctor_name: "Dr. Kavya Rao".to_string(),
        department: "Obstetrics".to_string(),
        decision,
        notes: "Repeat scan in 2 weeks".to_string(),
        severity: Severity::Abnormal,
        ts_utc: ts.to_string(),
    }
}

#[test]
fn records_read_back_in_append_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = NdjsonAuditSink::open_or_create(dir.path()).unwrap();
    let first = record("PT-9", AuditDecision::APPROVED, "2026-02-12T09:00:00Z");
    let second = record("PT-9", AuditDecision::REJECTED, "2026-02-12T09:30:00Z");
    sink.append(&first).unwrap();
    sink.append(&second).unwrap();

    assert_eq!(sink.records_for("PT-9").unwrap(), vec![first, second]);
    assert!(sink.records_for("PT-10").unwrap().is_empty());
}

#[test]
fn lines_are_sorted_key_json() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = NdjsonAuditSink::open_or_create(dir.path()).unwrap();
    sink.append(&record("PT-9", AuditDecision::APPROVED, "2026-02-12T09:00:00Z"))
        .unwrap();

    let raw = std::fs::read_to_string(sink.path_for("PT-9").unwrap()).unwrap();
    let line = raw.lines().next().unwrap();
    assert!(line.starts_with(r#"{"decision":"APPROVED","department":"Obstetrics""#));
    assert!(raw.ends_with('\n'));
}

#[test]
fn recorder_skips_records_already_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let r = record("PT-9", AuditDecision::APPROVED, "2026-02-12T09:00:00Z");

    let mut first = AuditRecorder::new(NdjsonAuditSink::open_or_create(dir.path()).unwrap());
    assert!(matches!(first.write(r.clone()).unwrap(), RecordOutcome::Written(_)));

    let mut reopened = AuditRecorder::new(NdjsonAuditSink::open_or_create(dir.path()).unwrap());
    let outcome = reopened.write(r).unwrap();
    assert!(matches!(outcome, RecordOutcome::AlreadyRecorded(_)));
    assert_eq!(reopened.sink().records_for("PT-9").unwrap().len(), 1);
}

#[test]
fn patient_ids_cannot_escape_the_audit_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = NdjsonAuditSink::open_or_create(dir.path()).unwrap();
    let err = sink.append(&record("../etc", AuditDecision::REJECTED, "2026-02-12T09:00:00Z"));
    assert!(err.is_err());
}

#[test]
fn corrupt_line_does_not_block_later_writes() {
    let dir = tempfile::tempdir().unwrap();
    let sink = NdjsonAuditSink::open_or_create(dir.path()).unwrap();
    let path = sink.path_for("PT-9").unwrap();
    let good = record("PT-9", AuditDecision::APPROVED, "2026-02-12T09:00:00Z");
    std::fs::write(
        &path,
        format!(
            "{}\n{{\"decision\":\"APPRO\n",
            serde_json::to_string(&good).unwrap()
        ),
    )
    .unwrap();

    let mut recorder = AuditRecorder::new(sink);
    let later = record("PT-9", AuditDecision::REJECTED, "2026-02-12T09:30:00Z");
    assert!(matches!(
        recorder.write(later.clone()).unwrap(),
        RecordOutcome::Written(_)
    ));
    assert!(matches!(
        recorder.write(good.clone()).unwrap(),
        RecordOutcome::AlreadyRecorded(_)
    ));
    assert_eq!(
        recorder.sink().records_for("PT-9").unwrap(),
        vec![good, later]
    );
}
