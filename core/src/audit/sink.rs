use crate::audit::record::{AuditDecision, AuditRecord};
use crate::error::{CoreError, CoreResult};
use crate::intake::parser::validate_patient_id;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Append-only store of audit records, keyed by patient id.
pub trait AuditSink {
    fn append(&mut self, record: &AuditRecord) -> CoreResult<()>;
    fn contains(
        &self,
        patient_id: &str,
        ts_utc: &str,
        decision: AuditDecision,
    ) -> CoreResult<bool>;
    fn records_for(&self, patient_id: &str) -> CoreResult<Vec<AuditRecord>>;
}

/// One `<patient_id>.ndjson` file per patient under `root`.
pub struct NdjsonAuditSink {
    root: PathBuf,
}

impl NdjsonAuditSink {
    pub fn open_or_create(root: impl AsRef<Path>) -> CoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            CoreError::AuditSink(format!("cannot create audit dir {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn path_for(&self, patient_id: &str) -> CoreResult<PathBuf> {
        validate_patient_id(patient_id)?;
        Ok(self.root.join(format!("{}.ndjson", patient_id)))
    }
}

impl AuditSink for NdjsonAuditSink {
    fn append(&mut self, record: &AuditRecord) -> CoreResult<()> {
        let path = self.path_for(&record.patient_id)?;
        let line = to_sorted_json_line(record)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CoreError::AuditSink(format!("open {}: {}", path.display(), e)))?;
        f.write_all(line.as_bytes())
            .and_then(|_| f.write_all(b"\n"))
            .map_err(|e| CoreError::AuditSink(format!("write {}: {}", path.display(), e)))?;
        Ok(())
    }

    fn contains(
        &self,
        patient_id: &str,
        ts_utc: &str,
        decision: AuditDecision,
    ) -> CoreResult<bool> {
        Ok(self
            .records_for(patient_id)?
            .iter()
            .any(|r| r.key() == (patient_id, ts_utc, decision)))
    }

    fn records_for(&self, patient_id: &str) -> CoreResult<Vec<AuditRecord>> {
        let path = self.path_for(patient_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path)
            .map_err(|e| CoreError::AuditSink(format!("open {}: {}", path.display(), e)))?;
        let mut out = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .map_err(|e| CoreError::AuditSink(format!("read {}: {}", path.display(), e)))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => out.push(record),
                // A torn or hand-edited line must not block later writes for the patient.
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping unreadable audit line"
                ),
            }
        }
        Ok(out)
    }
}

/// In-process sink for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Vec<AuditRecord>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[AuditRecord] {
        &self.records
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&mut self, record: &AuditRecord) -> CoreResult<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn contains(
        &self,
        patient_id: &str,
        ts_utc: &str,
        decision: AuditDecision,
    ) -> CoreResult<bool> {
        Ok(self
            .records
            .iter()
            .any(|r| r.key() == (patient_id, ts_utc, decision)))
    }

    fn records_for(&self, patient_id: &str) -> CoreResult<Vec<AuditRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect())
    }
}

// Compact JSON with keys sorted, so identical records produce identical lines.
fn to_sorted_json_line(record: &AuditRecord) -> CoreResult<String> {
    let v = sort_keys(serde_json::to_value(record)?);
    Ok(serde_json::to_string(&v)?)
}

fn sort_keys(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, vv)| (k, sort_keys(vv))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
