//! Grouping and continuity repair.
//!
//! Consumes per-page scan outcomes in index order and emits contiguous
//! same-institution page groups. One decision per page, no lookahead, no
//! backtracking: a closed group is never reopened or merged.

use tracing::debug;

use crate::types::{Classification, GroupLabel, PageGroup, PageOutcome, PageScan};

/// Exact-match markers identifying end-of-report summary pages.
pub const TRAILER_MARKERS: [&str; 2] = ["End of Report", "Grand Total"];

/// Whether a page's full text marks it as a trailer.
pub fn is_trailer(full_text: &str) -> bool {
    TRAILER_MARKERS
        .iter()
        .any(|marker| full_text.contains(marker))
}

/// Group-in-progress carried by the scan state.
struct OpenGroup {
    label: GroupLabel,
    pages: Vec<usize>,
    representative_text: String,
}

impl OpenGroup {
    fn start(label: GroupLabel, scan: &PageScan) -> Self {
        Self {
            label,
            pages: vec![scan.index],
            representative_text: scan.full_text.clone(),
        }
    }

    fn close(self) -> PageGroup {
        PageGroup {
            label: self.label,
            pages: self.pages,
            representative_text: self.representative_text,
        }
    }
}

/// Run the single left-to-right grouping pass.
///
/// Continuity repair: an unresolved page inherits the last attributed
/// label, on the assumption that a misclassified page continues the
/// previous institution's report rather than starting one. With no label to
/// inherit it becomes [`GroupLabel::Unclassified`] and starts its own
/// group, which stays standalone even if the next page resolves.
///
/// Trailer pages close the open group, reset the inherited label, and join
/// no group. If the pass would leave a non-empty document with zero groups,
/// a single catch-all group spanning every page is emitted instead, so no
/// input page is ever silently dropped.
pub fn group_pages(scans: &[PageScan]) -> Vec<PageGroup> {
    let mut groups: Vec<PageGroup> = Vec::new();
    let mut open: Option<OpenGroup> = None;
    let mut last_label: Option<GroupLabel> = None;

    for scan in scans {
        let classification = match &scan.outcome {
            PageOutcome::Trailer => {
                if let Some(group) = open.take() {
                    debug!(
                        label = %group.label,
                        pages = group.pages.len(),
                        "trailer closes group"
                    );
                    groups.push(group.close());
                }
                last_label = None;
                continue;
            }
            PageOutcome::Classified(classification) => classification,
        };

        let label = match classification {
            Classification::Resolved { code, .. } => GroupLabel::Institution(code.clone()),
            Classification::Unresolved { .. } => match &last_label {
                Some(label) => label.clone(),
                None => GroupLabel::Unclassified,
            },
        };

        match open.as_mut() {
            Some(group) if group.label == label => group.pages.push(scan.index),
            _ => {
                if let Some(group) = open.take() {
                    groups.push(group.close());
                }
                open = Some(OpenGroup::start(label.clone(), scan));
            }
        }
        last_label = Some(label);
    }

    if let Some(group) = open.take() {
        groups.push(group.close());
    }

    // Empty-input guard: never drop a non-empty document on the floor.
    if groups.is_empty() && !scans.is_empty() {
        debug!(pages = scans.len(), "zero groups produced, emitting catch-all");
        groups.push(PageGroup {
            label: GroupLabel::CatchAll,
            pages: scans.iter().map(|s| s.index).collect(),
            representative_text: scans[0].full_text.clone(),
        });
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassificationSource;

    fn resolved(code: &str) -> PageOutcome {
        PageOutcome::Classified(Classification::Resolved {
            code: code.to_string(),
            source: ClassificationSource::Rule,
        })
    }

    fn unresolved() -> PageOutcome {
        PageOutcome::Classified(Classification::Unresolved {
            reason: crate::types::UnresolvedReason::ClassifierDisabled,
        })
    }

    fn scans(outcomes: Vec<PageOutcome>) -> Vec<PageScan> {
        outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| PageScan {
                index,
                full_text: format!("page {index}"),
                outcome,
            })
            .collect()
    }

    fn labels(groups: &[PageGroup]) -> Vec<String> {
        groups.iter().map(|g| g.label.as_code().to_string()).collect()
    }

    #[test]
    fn test_trailer_markers() {
        assert!(is_trailer("... End of Report ..."));
        assert!(is_trailer("Grand Total: 1,234.00"));
        assert!(!is_trailer("end of report")); // exact match, case-sensitive
        assert!(!is_trailer("Totals"));
    }

    #[test]
    fn test_consecutive_same_code_pages_form_one_group() {
        let groups = group_pages(&scans(vec![resolved("APO"), resolved("APO"), resolved("APO")]));
        assert_eq!(labels(&groups), vec!["APO"]);
        assert_eq!(groups[0].pages, vec![0, 1, 2]);
    }

    #[test]
    fn test_code_change_closes_group() {
        let groups = group_pages(&scans(vec![resolved("APO"), resolved("FPL")]));
        assert_eq!(labels(&groups), vec!["APO", "FPL"]);
        assert_eq!(groups[0].pages, vec![0]);
        assert_eq!(groups[1].pages, vec![1]);
    }

    #[test]
    fn test_continuity_repair() {
        // [A, UNRESOLVED, UNRESOLVED, B] -> [A,A,A], [B].
        let groups = group_pages(&scans(vec![
            resolved("APO"),
            unresolved(),
            unresolved(),
            resolved("FPL"),
        ]));
        assert_eq!(labels(&groups), vec!["APO", "FPL"]);
        assert_eq!(groups[0].pages, vec![0, 1, 2]);
        assert_eq!(groups[1].pages, vec![3]);
    }

    #[test]
    fn test_leading_unresolved_stays_standalone() {
        // [UNRESOLVED, UNRESOLVED, A] -> UNCLASSIFIED group,
        // then A group. Never merged forward.
        let groups = group_pages(&scans(vec![unresolved(), unresolved(), resolved("APO")]));
        assert_eq!(labels(&groups), vec!["UNCLASSIFIED", "APO"]);
        assert_eq!(groups[0].pages, vec![0, 1]);
        assert_eq!(groups[1].pages, vec![2]);
    }

    #[test]
    fn test_trailer_isolation() {
        // [A, A, TRAILER, B] -> [A,A], trailer in no group, [B].
        let groups = group_pages(&scans(vec![
            resolved("APO"),
            resolved("APO"),
            PageOutcome::Trailer,
            resolved("FPL"),
        ]));
        assert_eq!(labels(&groups), vec!["APO", "FPL"]);
        assert_eq!(groups[0].pages, vec![0, 1]);
        assert_eq!(groups[1].pages, vec![3]);
    }

    #[test]
    fn test_unresolved_after_trailer_is_unclassified() {
        // The trailer resets the inherited label; the following unresolved
        // page cannot inherit across it.
        let groups = group_pages(&scans(vec![
            resolved("APO"),
            PageOutcome::Trailer,
            unresolved(),
        ]));
        assert_eq!(labels(&groups), vec!["APO", "UNCLASSIFIED"]);
        assert_eq!(groups[1].pages, vec![2]);
    }

    #[test]
    fn test_no_drop_invariant() {
        // Group indices plus trailers cover {0..N-1} exactly once.
        let input = scans(vec![
            resolved("APO"),
            unresolved(),
            PageOutcome::Trailer,
            unresolved(),
            resolved("WMG"),
            PageOutcome::Trailer,
        ]);
        let groups = group_pages(&input);

        let mut covered: Vec<usize> = groups.iter().flat_map(|g| g.pages.clone()).collect();
        covered.extend(
            input
                .iter()
                .filter(|s| s.outcome == PageOutcome::Trailer)
                .map(|s| s.index),
        );
        covered.sort_unstable();
        assert_eq!(covered, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_groups_are_contiguous_runs() {
        let groups = group_pages(&scans(vec![
            resolved("APO"),
            resolved("FPL"),
            resolved("APO"),
        ]));
        assert_eq!(labels(&groups), vec!["APO", "FPL", "APO"]);
        for group in &groups {
            for pair in group.pages.windows(2) {
                assert_eq!(pair[1], pair[0] + 1);
            }
        }
    }

    #[test]
    fn test_all_trailer_document_yields_catch_all() {
        // The guard spans every page under the catch-all code.
        let groups = group_pages(&scans(vec![PageOutcome::Trailer, PageOutcome::Trailer]));
        assert_eq!(labels(&groups), vec!["ALL"]);
        assert_eq!(groups[0].pages, vec![0, 1]);
    }

    #[test]
    fn test_empty_document_yields_zero_groups() {
        assert!(group_pages(&[]).is_empty());
    }

    #[test]
    fn test_representative_text_is_first_page_of_group() {
        let groups = group_pages(&scans(vec![resolved("APO"), resolved("APO")]));
        assert_eq!(groups[0].representative_text, "page 0");
    }
}
