use crate::intake::model::DoctorCandidate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingReason {
    OrderingDoctorAvailable,
    OrderingDoctorUnavailable,
}

impl RoutingReason {
    pub fn describe(&self) -> &'static str {
        match self {
            RoutingReason::OrderingDoctorAvailable => "ordering doctor available",
            RoutingReason::OrderingDoctorUnavailable => {
                "ordering doctor unavailable → routed to same department"
            }
        }
    }
}

/// Doctor responsible for a case. Derived from the two candidates, never stored on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub doctor_id: String,
    pub doctor: DoctorCandidate,
    pub reason: RoutingReason,
}

impl Assignment {
    pub fn department(&self) -> &str {
        &self.doctor.department
    }
}

/// Pick the ordering doctor when available, otherwise the same-department fallback.
///
/// The fallback is returned even when it is itself unavailable; it is the terminal choice.
pub fn resolve(ordering: &DoctorCandidate, fallback: &DoctorCandidate) -> (Assignment, RoutingReason) {
    let (doctor, reason) = if ordering.available {
        (ordering, RoutingReason::OrderingDoctorAvailable)
    } else {
        (fallback, RoutingReason::OrderingDoctorUnavailable)
    };
    let assignment = Assignment {
        doctor_id: doctor_id(doctor),
        doctor: doctor.clone(),
        reason,
    };
    (assignment, reason)
}

/// Stable identifier for a doctor, so audit records can name one without a registry.
pub fn doctor_id(doctor: &DoctorCandidate) -> String {
    let mut h = Sha256::new();
    h.update(doctor.department.as_bytes());
    h.update(b"|");
    h.update(doctor.name.as_bytes());
    let digest = h.finalize();
    format!("dr_{}", hex::encode(&digest[0..8]))
}
