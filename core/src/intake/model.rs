use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NOT_AVAILABLE: &str = "N/A";

const IMAGING_BLOCKS: &[&str] = &[
    "ultrasound",
    "ct",
    "mri",
    "xray",
    "x_ray",
    "imaging",
    "radiology",
    "pet",
    "doppler",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClinicalContext {
    Pregnancy,
    General,
    Chronic,
    Other(String),
}

impl ClinicalContext {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PREGNANCY" | "ANTENATAL" => ClinicalContext::Pregnancy,
            "GENERAL" | "" => ClinicalContext::General,
            "CHRONIC" => ClinicalContext::Chronic,
            _ => ClinicalContext::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ClinicalContext::Pregnancy => "PREGNANCY",
            ClinicalContext::General => "GENERAL",
            ClinicalContext::Chronic => "CHRONIC",
            ClinicalContext::Other(raw) => raw.as_str(),
        }
    }
}

/// Machine-computed severity, normalized from whatever label the AI report used.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Normal,
    Unknown,
    Abnormal,
}

impl Severity {
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Severity::Unknown;
        };
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "" | "N/A" => Severity::Unknown,
            "NORMAL" | "LOW" | "OK" | "WITHIN RANGE" | "WITHIN_RANGE" => Severity::Normal,
            _ => Severity::Abnormal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "NORMAL",
            Severity::Unknown => "UNKNOWN",
            Severity::Abnormal => "ABNORMAL",
        }
    }

    /// Wording shown to patients. Raw scores never leave the case.
    pub fn patient_label(&self) -> &'static str {
        match self {
            Severity::Normal => "Normal",
            Severity::Unknown | Severity::Abnormal => "Needs follow-up",
        }
    }

    pub fn risk_label(&self) -> &'static str {
        match self {
            Severity::Normal => "Low",
            Severity::Unknown | Severity::Abnormal => "Needs review",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientDetails {
    pub patient_id: String,
    pub age: Option<u32>,
    pub gender: String,
    pub clinical_context: ClinicalContext,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FindingRow {
    pub parameter: String,
    pub value: String,
    pub guideline_range: String,
    pub severity: String,
    pub risk: String,
    pub action: String,
}

/// One modality's structured AI output, e.g. the `lab_summary` block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FindingsBlock {
    pub name: String,
    pub rows: Vec<FindingRow>,
    pub report_ref: Option<String>,
}

impl FindingsBlock {
    pub fn severity(&self) -> Severity {
        self.rows
            .iter()
            .map(|r| Severity::from_raw(Some(r.severity.as_str())))
            .max()
            .unwrap_or(Severity::Unknown)
    }

    pub fn is_lab(&self) -> bool {
        self.name == "lab" || self.name == "labs" || self.name == "blood"
    }

    pub fn is_imaging(&self) -> bool {
        IMAGING_BLOCKS.contains(&self.name.as_str())
    }

    pub fn display_name(&self) -> String {
        match self.name.as_str() {
            "lab" | "labs" => "Lab".to_string(),
            "ct" => "CT".to_string(),
            "mri" => "MRI".to_string(),
            "pet" => "PET".to_string(),
            "xray" | "x_ray" => "X-ray".to_string(),
            other => {
                let mut chars = other.replace('_', " ").chars().collect::<Vec<_>>();
                if let Some(first) = chars.first_mut() {
                    *first = first.to_ascii_uppercase();
                }
                chars.into_iter().collect()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoctorCandidate {
    pub name: String,
    pub department: String,
    pub available: bool,
}

/// Symbolic reference to a document resolved outside the workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRef {
    pub artifact_id: String,
    pub artifact_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Canonical case shape. Never mutated once a review session has loaded it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClinicalCase {
    pub patient: PatientDetails,
    pub structured_summary: BTreeMap<String, String>,
    pub short_summary: String,
    pub findings: BTreeMap<String, FindingsBlock>,
    pub severity: Severity,
    pub risk_classification: String,
    pub ordering_doctor: DoctorCandidate,
    pub fallback_doctor: DoctorCandidate,
    pub guideline_validation: String,
    pub routing_decision: String,
    pub preset_notes: String,
    pub preset_next_ultrasound: Option<String>,
    pub report_references: Vec<String>,
}

impl ClinicalCase {
    pub fn patient_id(&self) -> &str {
        &self.patient.patient_id
    }

    pub fn context(&self) -> &ClinicalContext {
        &self.patient.clinical_context
    }

    pub fn block(&self, name: &str) -> Option<&FindingsBlock> {
        self.findings.get(name)
    }

    pub fn has_lab_block(&self) -> bool {
        self.findings.values().any(FindingsBlock::is_lab)
    }

    pub fn has_imaging_block(&self) -> bool {
        self.findings.values().any(FindingsBlock::is_imaging)
    }

    /// Report references in block order, then free-standing references.
    pub fn report_artifacts(&self) -> Vec<ArtifactRef> {
        let mut out: Vec<ArtifactRef> = self
            .findings
            .values()
            .filter_map(|b| {
                b.report_ref.as_ref().map(|r| ArtifactRef {
                    artifact_id: r.clone(),
                    artifact_kind: format!("{}_report", b.name),
                    sha256: None,
                })
            })
            .collect();
        for r in &self.report_references {
            if out.iter().any(|a| &a.artifact_id == r) {
                continue;
            }
            out.push(ArtifactRef {
                artifact_id: r.clone(),
                artifact_kind: "report".to_string(),
                sha256: None,
            });
        }
        out
    }
}
