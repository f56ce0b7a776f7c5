//! Hybrid rule/AI code resolution.
//!
//! Fixed precedence: the rule extractor runs first and its answer is final;
//! the AI classifier is consulted only on abstention, and only when one is
//! configured. All failure shapes collapse to
//! [`Classification::Unresolved`]; cross-page repair belongs to the
//! grouping engine, not here.

use tracing::{debug, warn};

use crate::blacklist::Blacklist;
use crate::classifier::{HeaderClassifier, UNKNOWN_REPLY};
use crate::config::SplitConfig;
use crate::decoder::PageDecoder;
use crate::rule::extract_rule;
use crate::types::{Classification, ClassificationSource, UnresolvedReason};

/// Resolves one page at a time, rule first, AI second.
pub struct HybridResolver<'a> {
    config: &'a SplitConfig,
    rule_blacklist: Blacklist,
    ai_blacklist: Blacklist,
    classifier: Option<&'a dyn HeaderClassifier>,
}

impl<'a> HybridResolver<'a> {
    pub fn new(config: &'a SplitConfig, classifier: Option<&'a dyn HeaderClassifier>) -> Self {
        Self {
            config,
            rule_blacklist: Blacklist::new(&config.rule_blacklist),
            ai_blacklist: Blacklist::new(&config.ai_blacklist),
            classifier,
        }
    }

    /// Resolve the institution code for one page.
    ///
    /// Per-page failures never escape: an unreadable region falls through
    /// to the AI stage, and every AI failure shape maps to a distinct
    /// [`UnresolvedReason`].
    pub async fn resolve(&self, decoder: &dyn PageDecoder, index: usize) -> Classification {
        let region_text = match decoder.region_text(index, self.config.scan_region) {
            Ok(text) => text,
            Err(e) => {
                debug!(page = index, error = %e, "corner region unreadable, rule abstains");
                String::new()
            }
        };

        if let Some(code) = extract_rule(&region_text, &self.rule_blacklist) {
            debug!(page = index, code = %code, "rule extractor resolved");
            return Classification::Resolved {
                code,
                source: ClassificationSource::Rule,
            };
        }

        let Some(classifier) = self.classifier else {
            return Classification::Unresolved {
                reason: UnresolvedReason::ClassifierDisabled,
            };
        };

        let header_png = match decoder.render_header(
            index,
            self.config.header_fraction,
            self.config.render_zoom,
        ) {
            Ok(png) => png,
            Err(e) => {
                warn!(page = index, error = %e, "header render failed");
                return Classification::Unresolved {
                    reason: UnresolvedReason::RenderFailed,
                };
            }
        };

        match classifier.classify_header(&header_png).await {
            Ok(raw) => self.normalize_ai_answer(index, &raw),
            Err(e) => {
                warn!(page = index, error = %e, "classifier failed after retries");
                Classification::Unresolved {
                    reason: UnresolvedReason::ClassifierFailed,
                }
            }
        }
    }

    /// Apply the second blacklist pass to the model's answer.
    fn normalize_ai_answer(&self, index: usize, raw: &str) -> Classification {
        let code = raw.trim().to_uppercase();

        if code.is_empty() || code == UNKNOWN_REPLY {
            return Classification::Unresolved {
                reason: UnresolvedReason::ClassifierUnsure,
            };
        }
        if self.ai_blacklist.contains(&code) {
            warn!(page = index, code = %code, "classifier echoed a blacklisted decoy");
            return Classification::Unresolved {
                reason: UnresolvedReason::DecoyEcho,
            };
        }

        debug!(page = index, code = %code, "AI fallback resolved");
        Classification::Resolved {
            code,
            source: ClassificationSource::Ai,
        }
    }
}
