//! Run orchestration: scan, classify, group, assemble.

use tracing::info;

use crate::assemble::{assemble, build_archive};
use crate::classifier::HeaderClassifier;
use crate::config::SplitConfig;
use crate::decoder::PageDecoder;
use crate::error::SplitResult;
use crate::grouping::{group_pages, is_trailer};
use crate::resolver::HybridResolver;
use crate::types::{
    Classification, ClassificationSource, GroupLabel, PageGroup, PageOutcome, PageScan, RunOutput,
    RunStats,
};

/// The splitting pipeline.
///
/// One `split` call performs the entire run and returns everything it
/// produced by value; no state survives the call.
pub struct Splitter {
    config: SplitConfig,
}

impl Splitter {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Classify and group every page, then assemble the output files and
    /// archive.
    ///
    /// Pages are processed strictly in index order; the resolver runs
    /// exactly once per non-trailer page, and the AI fallback call (when
    /// taken) is awaited inline before the next page is touched. Only a
    /// document-level failure aborts the run.
    pub async fn split(
        &self,
        decoder: &dyn PageDecoder,
        classifier: Option<&dyn HeaderClassifier>,
    ) -> SplitResult<RunOutput> {
        let resolver = HybridResolver::new(&self.config, classifier);
        let page_count = decoder.page_count()?;
        info!(pages = page_count, decoder = decoder.name(), "starting split run");

        let mut scans = Vec::with_capacity(page_count);
        let mut stats = RunStats::default();

        for index in 0..page_count {
            // A page whose text cannot be read is still scanned: it cannot
            // be a trailer and its classification proceeds from the region
            // and header alone.
            let full_text = match decoder.page_text(index) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(page = index, error = %e, "page text extraction failed");
                    String::new()
                }
            };
            stats.pages += 1;

            let outcome = if is_trailer(&full_text) {
                stats.trailer_pages += 1;
                PageOutcome::Trailer
            } else {
                let classification = resolver.resolve(decoder, index).await;
                match &classification {
                    Classification::Resolved {
                        source: ClassificationSource::Rule,
                        ..
                    } => stats.rule_hits += 1,
                    Classification::Resolved {
                        source: ClassificationSource::Ai,
                        ..
                    } => stats.ai_hits += 1,
                    Classification::Unresolved { .. } => {}
                }
                PageOutcome::Classified(classification)
            };

            scans.push(PageScan {
                index,
                full_text,
                outcome,
            });
        }

        let groups = group_pages(&scans);
        count_repairs(&scans, &groups, &mut stats);

        let files = assemble(decoder, &groups)?;
        let archive = build_archive(&files)?;

        info!(
            groups = groups.len(),
            files = files.len(),
            rule_hits = stats.rule_hits,
            ai_hits = stats.ai_hits,
            inherited = stats.inherited,
            unclassified = stats.unclassified,
            "split run finished"
        );

        Ok(RunOutput {
            files,
            archive,
            stats,
        })
    }
}

/// Attribute each unresolved page to the repair that covered it.
fn count_repairs(scans: &[PageScan], groups: &[PageGroup], stats: &mut RunStats) {
    for group in groups {
        let institution = matches!(group.label, GroupLabel::Institution(_));
        for &index in &group.pages {
            let unresolved = matches!(
                scans[index].outcome,
                PageOutcome::Classified(Classification::Unresolved { .. })
            );
            if unresolved {
                if institution {
                    stats.inherited += 1;
                } else {
                    stats.unclassified += 1;
                }
            }
        }
    }
}
