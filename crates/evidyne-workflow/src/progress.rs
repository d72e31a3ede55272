//! Typed events emitted while the workflow runs (cloneable for broadcast).

use serde::Serialize;

use crate::state::Stage;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Busy-overlay progress, 0..=100, non-decreasing within a transition.
    Progress { percent: u8, message: String },
    /// Result of a keyword hit-count recompute.
    HitCount { count: u64 },
    StageChanged { stage: Stage },
    /// One document finished its analysis pass. `degraded` marks a
    /// per-document failure that kept the original fields.
    DocumentAnalyzed {
        id: String,
        index: usize,
        total: usize,
        degraded: bool,
    },
    /// A transition aborted; the single user-facing failure notice.
    TransitionFailed { kind: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_type_tags() {
        let json = serde_json::to_value(WorkflowEvent::Progress {
            percent: 45,
            message: "working".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["percent"], 45);

        let json = serde_json::to_value(WorkflowEvent::StageChanged {
            stage: Stage::KeywordSelection,
        })
        .unwrap();
        assert_eq!(json["type"], "stage_changed");
        assert_eq!(json["stage"], "keyword_selection");
    }
}
