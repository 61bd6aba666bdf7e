use crate::error::{CoreError, CoreResult};
use crate::intake::model::{ArtifactRef, ClinicalCase};
use crate::intake::parser::validate_patient_id;
use crate::report::render::render_report_document;
use crate::review::state::{ReviewDecision, ReviewStatus};
use crate::routing::resolver::Assignment;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_ARTIFACT_KIND: &str = "doctor_approved_report";

/// Emits the doctor-approved report document for a case.
pub trait ReportProducer {
    fn produce(
        &self,
        case: &ClinicalCase,
        assignment: &Assignment,
        decision: &ReviewDecision,
    ) -> CoreResult<ArtifactRef>;
}

pub fn report_file_name(patient_id: &str) -> String {
    format!("final_report_{}.md", patient_id)
}

/// Writes `final_report_<patient_id>.md` into a directory.
pub struct FileReportProducer {
    dir: PathBuf,
}

impl FileReportProducer {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl ReportProducer for FileReportProducer {
    fn produce(
        &self,
        case: &ClinicalCase,
        assignment: &Assignment,
        decision: &ReviewDecision,
    ) -> CoreResult<ArtifactRef> {
        if decision.status != ReviewStatus::APPROVED {
            return Err(CoreError::ContractViolation(format!(
                "report artifact requested while decision is {}",
                decision.status.as_str()
            )));
        }
        validate_patient_id(case.patient_id())?;
        let body = render_report_document(case, assignment, decision);
        let file_name = report_file_name(case.patient_id());
        let path = self.dir.join(&file_name);
        fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(&path, body.as_bytes()))
            .map_err(|e| CoreError::ReportArtifact(format!("write {}: {}", path.display(), e)))?;

        let mut h = Sha256::new();
        h.update(body.as_bytes());
        let sha256 = hex::encode(h.finalize());
        tracing::info!(patient_id = %case.patient_id(), path = %path.display(), "report artifact written");
        Ok(ArtifactRef {
            artifact_id: file_name,
            artifact_kind: REPORT_ARTIFACT_KIND.to_string(),
            sha256: Some(sha256),
        })
    }
}
