use crate::intake::model::{ClinicalCase, NOT_AVAILABLE};
use crate::review::state::ReviewDecision;
use crate::routing::resolver::Assignment;

/// Markdown body of the doctor-validated report.
///
/// The "Generated on" line uses the decision timestamp, so the same decision always
/// renders the same bytes.
pub fn render_report_document(
    case: &ClinicalCase,
    assignment: &Assignment,
    decision: &ReviewDecision,
) -> String {
    let mut md = String::new();
    md.push_str("# Doctor-Validated Medical Report\n\n");

    md.push_str("## Patient Details\n\n");
    md.push_str(&format!("- Patient ID: {}\n", case.patient_id()));
    md.push_str(&format!(
        "- Age: {}\n",
        case.patient
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    ));
    md.push_str(&format!("- Gender: {}\n", case.patient.gender));
    md.push_str(&format!("- Clinical Context: {}\n\n", case.context().as_str()));

    md.push_str("## Doctor Details\n\n");
    md.push_str(&format!("- Doctor Name: {}\n", assignment.doctor.name));
    md.push_str(&format!("- Department: {}\n", assignment.department()));
    md.push_str(&format!("- Routing Reason: {}\n\n", assignment.reason.describe()));

    md.push_str("## Clinical Summary\n\n");
    md.push_str(&format!("{}\n\n", case.short_summary));
    for (k, v) in &case.structured_summary {
        md.push_str(&format!("- {}: {}\n", k, v));
    }
    md.push_str(&format!("- Overall Status: {}\n\n", case.severity.patient_label()));

    for block in case.findings.values() {
        md.push_str(&format!("### {} Findings\n\n", block.display_name()));
        md.push_str("| Parameter | Value | Guideline Range | Action |\n");
        md.push_str("|---|---|---|---|\n");
        for row in &block.rows {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                escape_cell(&row.parameter),
                escape_cell(&row.value),
                escape_cell(&row.guideline_range),
                escape_cell(&row.action)
            ));
        }
        md.push('\n');
    }

    md.push_str("## Doctor Instructions\n\n");
    md.push_str(&format!(
        "- Next Ultrasound: {}\n",
        decision.next_ultrasound.as_deref().unwrap_or(NOT_AVAILABLE)
    ));
    let notes = if decision.notes.trim().is_empty() {
        NOT_AVAILABLE
    } else {
        decision.notes.as_str()
    };
    md.push_str(&format!("- Doctor Notes: {}\n\n", notes));

    md.push_str(&format!(
        "Generated on: {}\n",
        decision.decided_at.as_deref().unwrap_or(NOT_AVAILABLE)
    ));
    md
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}
