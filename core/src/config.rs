//! Runtime configuration for a review deployment.
//!
//! Resolved once at startup and passed into the session; nothing below reads the
//! environment after `ReviewConfig::load` returns.

use crate::error::{CoreError, CoreResult};
use crate::notify::compose::{DEFAULT_SIGNATURE, NO_ULTRASOUND_REQUIRED};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const AUDIT_DIR_ENV: &str = "REVIEW_AUDIT_DIR";
pub const REPORT_DIR_ENV: &str = "REVIEW_REPORT_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewConfig {
    /// Directory holding one audit file per patient.
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,

    /// Directory receiving generated report artifacts.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    #[serde(default = "default_care_team_signature")]
    pub care_team_signature: String,

    /// Exact scan names a clinician may pick as the next ultrasound.
    #[serde(default = "default_ultrasound_options")]
    pub ultrasound_options: Vec<String>,

    /// error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from("audit")
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_care_team_signature() -> String {
    DEFAULT_SIGNATURE.to_string()
}
fn default_ultrasound_options() -> Vec<String> {
    [
        "Anomaly Scan (28 weeks)",
        "Growth Scan (32 weeks)",
        "Doppler Ultrasound",
        "NT Scan",
        NO_ULTRASOUND_REQUIRED,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            audit_dir: default_audit_dir(),
            report_dir: default_report_dir(),
            care_team_signature: default_care_team_signature(),
            ultrasound_options: default_ultrasound_options(),
            log_level: default_log_level(),
        }
    }
}

impl ReviewConfig {
    /// Load from a TOML file, falling back to defaults when no file is given or it does
    /// not exist. Directory overrides from the environment are applied last.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let mut cfg = match path {
            Some(p) if p.exists() => {
                let raw = fs::read_to_string(p)?;
                let cfg: ReviewConfig = toml::from_str(&raw).map_err(|e| {
                    CoreError::Config(format!("failed to parse {}: {}", p.display(), e))
                })?;
                tracing::info!(path = %p.display(), "configuration loaded");
                cfg
            }
            Some(p) => {
                tracing::info!(path = %p.display(), "configuration file absent, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        cfg.apply_env_overrides(
            std::env::var(AUDIT_DIR_ENV).ok(),
            std::env::var(REPORT_DIR_ENV).ok(),
        );
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> CoreResult<Self> {
        let cfg: ReviewConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self, audit_dir: Option<String>, report_dir: Option<String>) {
        if let Some(dir) = audit_dir.filter(|d| !d.trim().is_empty()) {
            self.audit_dir = PathBuf::from(dir);
        }
        if let Some(dir) = report_dir.filter(|d| !d.trim().is_empty()) {
            self.report_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.care_team_signature.trim().is_empty() {
            return Err(CoreError::Config(
                "care_team_signature cannot be empty".to_string(),
            ));
        }
        if self.ultrasound_options.is_empty() {
            return Err(CoreError::Config(
                "ultrasound_options must list at least one scan".to_string(),
            ));
        }
        Ok(())
    }

    /// Only picklist entries are accepted as a next-ultrasound selection.
    pub fn validate_ultrasound(&self, selection: &str) -> CoreResult<()> {
        if !self.ultrasound_options.iter().any(|o| o == selection) {
            return Err(CoreError::InvalidInput(format!(
                "unknown ultrasound selection {:?}",
                selection
            )));
        }
        Ok(())
    }
}
