//! Plain-text export of a finished report.

use chrono::Utc;
use serde::Serialize;

use crate::state::WorkflowState;

pub const EXPORT_HEADER: &str = "Clinical Evidence Synthesis Report";

/// A downloadable export: date-stamped filename plus the text body.
#[derive(Debug, Clone, Serialize)]
pub struct ReportExport {
    pub filename: String,
    pub content: String,
}

/// Fixed layout: header line, topic line, blank, report body, blank, then
/// one `- {title} (ID: {id})` line per adopted document in document order.
pub fn build_report_export(state: &WorkflowState) -> ReportExport {
    let references = state
        .documents
        .iter()
        .filter(|d| d.selected)
        .map(|d| format!("- {} (ID: {})", d.title, d.id))
        .collect::<Vec<_>>()
        .join("\n");

    let content = format!(
        "{EXPORT_HEADER}\nTopic: {}\n\n{}\n\nSelected References:\n{}",
        state.topic, state.report, references
    );
    let filename = format!("Evidence_Report_{}.txt", Utc::now().format("%Y-%m-%d"));

    ReportExport { filename, content }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DocumentCandidate;

    fn doc(id: &str, title: &str, selected: bool) -> DocumentCandidate {
        DocumentCandidate {
            id: id.into(),
            title: title.into(),
            abstract_text: "text".into(),
            translated_title: None,
            translated_abstract: None,
            relevance_analysis: None,
            selected,
            publication_date: None,
        }
    }

    #[test]
    fn test_export_layout_lists_selected_references_in_document_order() {
        let mut state = WorkflowState::new();
        state.topic = "SGLT2 inhibitors in heart failure".into();
        state.report = "Evidence is consistent.".into();
        state.documents = vec![
            doc("1", "A", true),
            doc("2", "B", true),
            doc("3", "C", false),
        ];

        let export = build_report_export(&state);
        assert_eq!(
            export.content,
            "Clinical Evidence Synthesis Report\n\
             Topic: SGLT2 inhibitors in heart failure\n\
             \n\
             Evidence is consistent.\n\
             \n\
             Selected References:\n\
             - A (ID: 1)\n\
             - B (ID: 2)"
        );
    }

    #[test]
    fn test_export_filename_is_date_stamped() {
        let export = build_report_export(&WorkflowState::new());
        assert!(export.filename.starts_with("Evidence_Report_"));
        assert!(export.filename.ends_with(".txt"));
        // Evidence_Report_YYYY-MM-DD.txt
        assert_eq!(export.filename.len(), "Evidence_Report_".len() + 10 + 4);
    }
}
