//! Core types for the classification and grouping pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Code rendered for groups that never received an institution code.
pub const UNCLASSIFIED_CODE: &str = "UNCLASSIFIED";

/// Code rendered for the single fallback group emitted by the empty-input
/// guard. `ALL` sits on the rule blacklist, so it can never collide with a
/// real institution code.
pub const CATCH_ALL_CODE: &str = "ALL";

/// Rectangular region on a page, in PDF points with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Region {
    /// Create a region from corner coordinates.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// Which stage of the hybrid strategy produced a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    /// The fixed-region rule extractor.
    Rule,
    /// The AI fallback classifier.
    Ai,
}

/// Why a page ended up without a code.
///
/// The grouping engine treats every variant identically; the distinction
/// exists for logs, so the hybrid strategy's accuracy can be debugged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The rule extractor abstained and no classifier was configured.
    ClassifierDisabled,
    /// The header region could not be rasterized for the classifier.
    RenderFailed,
    /// The classifier failed after exhausting its retry budget.
    ClassifierFailed,
    /// The classifier answered `UNKNOWN`.
    ClassifierUnsure,
    /// The classifier echoed a blacklisted decoy token.
    DecoyEcho,
}

/// Per-page classification outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A code was attributed to the page.
    Resolved {
        code: String,
        source: ClassificationSource,
    },
    /// No stage could attribute a code.
    Unresolved { reason: UnresolvedReason },
}

impl Classification {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Classification::Resolved { .. })
    }
}

/// What the scan pass decided about a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Summary/grand-total page. Closes the open group and joins none.
    Trailer,
    /// Regular page with its classification.
    Classified(Classification),
}

/// Scan result for one page, consumed in index order by the grouping engine.
#[derive(Debug, Clone)]
pub struct PageScan {
    /// Zero-based position in the source document.
    pub index: usize,
    /// Plain text of the whole page.
    pub full_text: String,
    pub outcome: PageOutcome,
}

/// Label attributed to a finished page group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupLabel {
    /// A real 3-letter institution code.
    Institution(String),
    /// No code could ever be attributed, including by inheritance.
    Unclassified,
    /// Fallback label for the empty-input guard group.
    CatchAll,
}

impl GroupLabel {
    /// The code string embedded in filenames and metadata.
    pub fn as_code(&self) -> &str {
        match self {
            GroupLabel::Institution(code) => code,
            GroupLabel::Unclassified => UNCLASSIFIED_CODE,
            GroupLabel::CatchAll => CATCH_ALL_CODE,
        }
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// A contiguous run of same-institution pages.
///
/// Built by a single left-to-right pass; once closed a group is never
/// reopened or merged.
#[derive(Debug, Clone)]
pub struct PageGroup {
    pub label: GroupLabel,
    /// Ordered page indices, strictly increasing by one.
    pub pages: Vec<usize>,
    /// Full text of the group's first page; decides the filename template.
    pub representative_text: String,
}

impl PageGroup {
    /// First and last page index of the group.
    ///
    /// Returns `None` for an empty group, which the assembler skips.
    pub fn page_range(&self) -> Option<(usize, usize)> {
        Some((*self.pages.first()?, *self.pages.last()?))
    }
}

/// A standalone output document produced from one [`PageGroup`].
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub filename: String,
    /// Bytes of the standalone PDF containing exactly the group's pages.
    pub content: Vec<u8>,
    /// Code attributed to the group, mirrored for display/audit.
    pub code: String,
    pub page_count: usize,
    /// Zero-based inclusive page range in the source document.
    pub page_range: (usize, usize),
}

/// Counters describing one classification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Pages scanned, trailers included.
    pub pages: usize,
    /// Pages recognized as trailers and excluded from all groups.
    pub trailer_pages: usize,
    /// Pages classified by the rule extractor.
    pub rule_hits: usize,
    /// Pages classified by the AI fallback.
    pub ai_hits: usize,
    /// Unresolved pages attributed to the preceding group's code.
    pub inherited: usize,
    /// Unresolved pages that ended up in an unclassified or catch-all group.
    pub unclassified: usize,
}

/// Everything a run produces. No state outlives this value.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub files: Vec<OutputFile>,
    /// Zip archive containing every output file, keyed by filename.
    pub archive: Vec<u8>,
    pub stats: RunStats,
}
