use super::model::{
    ClinicalCase, ClinicalContext, DoctorCandidate, FindingRow, FindingsBlock, PatientDetails,
    Severity, NOT_AVAILABLE,
};
use crate::error::{CoreError, CoreResult};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

const PATIENT_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]*$";

/// Keys ending in `_summary` that hold narrative text rather than a findings block.
const NON_BLOCK_SUMMARIES: &[&str] = &["structured_summary", "short_summary"];

/// Read and normalize a case record from disk.
pub fn load_case_record(path: impl AsRef<Path>) -> CoreResult<ClinicalCase> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        CoreError::CaseLoad(format!("cannot read case record {}: {}", path.display(), e))
    })?;
    parse_case_record(&raw)
}

/// Parse a doctor-review JSON document into the canonical case shape.
///
/// Only a corrupt document or an unusable patient id aborts the load. Every other
/// absent field is replaced with a placeholder.
pub fn parse_case_record(json_str: &str) -> CoreResult<ClinicalCase> {
    let raw: Value = serde_json::from_str(json_str)
        .map_err(|e| CoreError::CaseLoad(format!("failed to parse case record: {}", e)))?;
    let root = raw
        .as_object()
        .ok_or_else(|| CoreError::CaseLoad("case record must be a JSON object".to_string()))?;

    let patient = parse_patient_details(root)?;
    let pid = patient.patient_id.clone();

    let structured_summary = match root.get("structured_summary") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), value_text(v)))
            .collect(),
        _ => {
            placeholder(&pid, "structured_summary");
            BTreeMap::new()
        }
    };

    let findings = parse_findings_blocks(root);

    let severity = match first_present(root, &["severity", "overall_severity"]) {
        Some(v) => Severity::from_raw(Some(value_text(v).as_str())),
        None => findings
            .values()
            .map(FindingsBlock::severity)
            .max()
            .unwrap_or(Severity::Unknown),
    };

    let ordering_doctor = parse_ordering_doctor(root, &pid);
    let fallback_doctor = match root.get("fallback_doctor").and_then(Value::as_object) {
        Some(obj) => DoctorCandidate {
            name: text(obj, "name", &pid, "fallback_doctor.name"),
            department: obj
                .get("department")
                .map(value_text)
                .unwrap_or_else(|| ordering_doctor.department.clone()),
            available: obj.get("available").and_then(Value::as_bool).unwrap_or(true),
        },
        None => {
            placeholder(&pid, "fallback_doctor");
            DoctorCandidate {
                name: NOT_AVAILABLE.to_string(),
                department: ordering_doctor.department.clone(),
                available: false,
            }
        }
    };

    let preset_next_ultrasound = root
        .get("next_ultrasound")
        .or_else(|| {
            root.get("follow_up")
                .and_then(|f| f.get("next_ultrasound"))
        })
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let preset_notes = root
        .get("doctor_notes")
        .or_else(|| root.get("follow_up").and_then(|f| f.get("doctor_notes")))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let report_references = root
        .get("report_references")
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ClinicalCase {
        short_summary: text(root, "short_summary", &pid, "short_summary"),
        risk_classification: first_present(root, &["risk_classification", "risk_level"])
            .map(value_text)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        guideline_validation: text(root, "guideline_validation", &pid, "guideline_validation"),
        routing_decision: text(root, "routing_decision", &pid, "routing_decision"),
        patient,
        structured_summary,
        findings,
        severity,
        ordering_doctor,
        fallback_doctor,
        preset_notes,
        preset_next_ultrasound,
        report_references,
    })
}

fn parse_patient_details(root: &Map<String, Value>) -> CoreResult<PatientDetails> {
    let details = root
        .get("patient_details")
        .and_then(Value::as_object)
        .ok_or_else(|| CoreError::CaseLoad("missing patient_details".to_string()))?;

    let patient_id = details
        .get("patient_id")
        .map(value_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::CaseLoad("missing patient_details.patient_id".to_string()))?;
    validate_patient_id(&patient_id)?;

    let age = details.get("age").and_then(|v| match v {
        Value::Number(n) => n.as_u64().and_then(|a| u32::try_from(a).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    });
    if age.is_none() {
        placeholder(&patient_id, "patient_details.age");
    }

    let clinical_context = match first_present(details, &["clinical_context", "context"]) {
        Some(v) => ClinicalContext::from_raw(&value_text(v)),
        None => {
            placeholder(&patient_id, "patient_details.clinical_context");
            ClinicalContext::General
        }
    };

    Ok(PatientDetails {
        gender: text(details, "gender", &patient_id, "patient_details.gender"),
        patient_id,
        age,
        clinical_context,
    })
}

pub fn validate_patient_id(patient_id: &str) -> CoreResult<()> {
    let re = Regex::new(PATIENT_ID_PATTERN)
        .map_err(|_e| CoreError::InvalidInput("Regex compilation failed".to_string()))?;
    if !re.is_match(patient_id) {
        return Err(CoreError::CaseLoad(format!(
            "patient_id {:?} contains characters outside [A-Za-z0-9._-]",
            patient_id
        )));
    }
    Ok(())
}

fn parse_ordering_doctor(root: &Map<String, Value>, pid: &str) -> DoctorCandidate {
    if let Some(obj) = root.get("ordering_doctor").and_then(Value::as_object) {
        return DoctorCandidate {
            name: text(obj, "name", pid, "ordering_doctor.name"),
            department: text(obj, "department", pid, "ordering_doctor.department"),
            available: obj.get("available").and_then(Value::as_bool).unwrap_or_else(|| {
                placeholder(pid, "ordering_doctor.available");
                false
            }),
        };
    }
    // Older exports only carried the already-assigned doctor.
    if let Some(obj) = root.get("doctor_details").and_then(Value::as_object) {
        return DoctorCandidate {
            name: text(obj, "name", pid, "doctor_details.name"),
            department: text(obj, "department", pid, "doctor_details.department"),
            available: obj.get("available").and_then(Value::as_bool).unwrap_or(true),
        };
    }
    placeholder(pid, "ordering_doctor");
    DoctorCandidate {
        name: NOT_AVAILABLE.to_string(),
        department: NOT_AVAILABLE.to_string(),
        available: false,
    }
}

fn parse_findings_blocks(root: &Map<String, Value>) -> BTreeMap<String, FindingsBlock> {
    let mut out = BTreeMap::new();
    for (key, value) in root {
        let Some(name) = key.strip_suffix("_summary") else {
            continue;
        };
        if name.is_empty() || NON_BLOCK_SUMMARIES.contains(&key.as_str()) {
            continue;
        }
        let (rows, report_ref) = match value {
            Value::Array(items) => (parse_rows(items), None),
            Value::Object(obj) => {
                let report_ref = obj
                    .get("report_ref")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let rows = match obj.get("findings") {
                    Some(Value::Array(items)) => parse_rows(items),
                    _ => vec![parse_row(obj)],
                };
                (rows, report_ref)
            }
            _ => continue,
        };
        out.insert(
            name.to_string(),
            FindingsBlock {
                name: name.to_string(),
                rows,
                report_ref,
            },
        );
    }
    out
}

fn parse_rows(items: &[Value]) -> Vec<FindingRow> {
    items
        .iter()
        .filter_map(Value::as_object)
        .map(parse_row)
        .collect()
}

fn parse_row(obj: &Map<String, Value>) -> FindingRow {
    let field = |keys: &[&str]| {
        first_present(obj, keys)
            .map(value_text)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };
    FindingRow {
        parameter: field(&["parameter", "name"]),
        value: field(&["value", "result"]),
        guideline_range: field(&["guideline_range", "reference_range", "range"]),
        severity: field(&["severity", "status"]),
        risk: field(&["risk"]),
        action: field(&["action", "recommended_action"]),
    }
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn text(obj: &Map<String, Value>, key: &str, pid: &str, path: &str) -> String {
    match obj.get(key) {
        Some(v) if !v.is_null() => value_text(v),
        _ => {
            placeholder(pid, path);
            NOT_AVAILABLE.to_string()
        }
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => NOT_AVAILABLE.to_string(),
        other => other.to_string(),
    }
}

fn placeholder(pid: &str, path: &str) {
    tracing::debug!(patient_id = pid, field = path, "optional field missing, using placeholder");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> &'static str {
        r#"{
            "patient_details": {
                "patient_id": "PT-2026-014",
                "age": 29,
                "gender": "Female",
                "clinical_context": "Pregnancy"
            },
            "structured_summary": {"Gestational Age": "24 weeks", "Fetal Heart Rate": 142},
            "short_summary": "Routine mid-trimester review.",
            "lab_summary": [
                {"parameter": "Hemoglobin", "value": "11.8 g/dL", "guideline_range": "11-14", "severity": "NORMAL", "risk": "LOW", "action": "None"}
            ],
            "ultrasound_summary": {
                "report_ref": "us_report_PT-2026-014",
                "findings": [
                    {"parameter": "AFI", "value": "14 cm", "severity": "NORMAL"}
                ]
            },
            "ordering_doctor": {"name": "Dr. Mehta", "department": "Obstetrics", "available": true},
            "fallback_doctor": {"name": "Dr. Rao", "department": "Obstetrics"},
            "guideline_validation": "PASSED",
            "routing_decision": "ROUTE_TO_ORDERING"
        }"#
    }

    #[test]
    fn test_parse_full_record() {
        let case = parse_case_record(sample_record()).unwrap();
        assert_eq!(case.patient_id(), "PT-2026-014");
        assert_eq!(case.patient.age, Some(29));
        assert_eq!(case.context(), &ClinicalContext::Pregnancy);
        assert_eq!(case.severity, Severity::Normal);
        assert_eq!(case.findings.len(), 2);
        assert!(case.has_lab_block());
        assert!(case.has_imaging_block());
        assert_eq!(
            case.structured_summary.get("Fetal Heart Rate").map(String::as_str),
            Some("142")
        );
        assert_eq!(case.report_artifacts().len(), 1);
    }

    #[test]
    fn test_short_and_structured_summaries_are_not_blocks() {
        let case = parse_case_record(sample_record()).unwrap();
        assert!(case.block("short").is_none());
        assert!(case.block("structured").is_none());
        assert_eq!(case.block("lab").unwrap().rows[0].parameter, "Hemoglobin");
    }

    #[test]
    fn test_missing_optional_fields_use_placeholders() {
        let minimal = r#"{"patient_details": {"patient_id": "PT-9"}}"#;
        let case = parse_case_record(minimal).unwrap();
        assert_eq!(case.patient.gender, NOT_AVAILABLE);
        assert_eq!(case.patient.age, None);
        assert_eq!(case.context(), &ClinicalContext::General);
        assert_eq!(case.short_summary, NOT_AVAILABLE);
        assert_eq!(case.guideline_validation, NOT_AVAILABLE);
        assert_eq!(case.severity, Severity::Unknown);
        assert!(!case.ordering_doctor.available);
        assert_eq!(case.fallback_doctor.name, NOT_AVAILABLE);
        assert!(case.findings.is_empty());
    }

    #[test]
    fn test_legacy_doctor_details_become_ordering_doctor() {
        let legacy = r#"{
            "patient_details": {"patient_id": "PT-7", "context": "CHRONIC"},
            "doctor_details": {"name": "Dr. Iyer", "department": "Endocrinology", "routing_reason": "n/a"}
        }"#;
        let case = parse_case_record(legacy).unwrap();
        assert_eq!(case.ordering_doctor.name, "Dr. Iyer");
        assert!(case.ordering_doctor.available);
        assert_eq!(case.fallback_doctor.department, "Endocrinology");
        assert_eq!(case.context(), &ClinicalContext::Chronic);
    }

    #[test]
    fn test_top_level_severity_overrides_blocks() {
        let record = r#"{
            "patient_details": {"patient_id": "PT-8"},
            "severity": "ABNORMAL",
            "lab_summary": {"parameter": "TSH", "value": "2.1", "severity": "NORMAL"}
        }"#;
        let case = parse_case_record(record).unwrap();
        assert_eq!(case.severity, Severity::Abnormal);
        assert_eq!(case.block("lab").unwrap().severity(), Severity::Normal);
    }

    #[test]
    fn test_corrupt_record_is_fatal() {
        assert!(matches!(
            parse_case_record("{ not json"),
            Err(CoreError::CaseLoad(_))
        ));
        assert!(matches!(
            parse_case_record("[1, 2]"),
            Err(CoreError::CaseLoad(_))
        ));
        assert!(matches!(
            parse_case_record(r#"{"patient_details": {"age": 40}}"#),
            Err(CoreError::CaseLoad(_))
        ));
    }

    #[test]
    fn test_patient_id_with_path_separator_rejected() {
        let record = r#"{"patient_details": {"patient_id": "../etc"}}"#;
        assert!(parse_case_record(record).is_err());
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_case_record(dir.path().join("doctor_review_output.json"));
        assert!(matches!(result, Err(CoreError::CaseLoad(_))));
    }
}
