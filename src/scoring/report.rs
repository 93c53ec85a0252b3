use serde::{Deserialize, Serialize};

use super::Severity;
use super::catalog::{PatternReport, SeverityText};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub header: String,
    pub content: String,
}

/// Cause, symptoms, treatments and home care at `severity`.
///
/// Unclassified patterns use the light text. Empty text is skipped.
pub fn build_sections(report: &PatternReport, severity: Option<Severity>) -> Vec<ReportSection> {
    let level = severity.unwrap_or(Severity::Light);
    let pick = |text: &SeverityText| match level {
        Severity::Light => text.light.clone(),
        Severity::Mild => text.mild.clone(),
        Severity::Serious => text.serious.clone(),
    };

    [
        ("成因", report.cause.clone()),
        ("症狀", pick(&report.symptoms_by_severity)),
        ("醫療處置", pick(&report.treatments_by_severity)),
        ("居家照顧", pick(&report.carings_by_severity)),
    ]
    .into_iter()
    .filter(|(_, content)| !content.is_empty())
    .map(|(header, content)| ReportSection {
        header: header.to_string(),
        content,
    })
    .collect()
}
