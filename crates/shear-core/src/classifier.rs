//! The AI fallback classifier seam.

use async_trait::async_trait;

use crate::error::SplitResult;

/// Answer a vision model gives when it cannot identify a code.
pub const UNKNOWN_REPLY: &str = "UNKNOWN";

/// Vision-model classification of a page header.
///
/// Implementations own their transport and retry policy; by the time an
/// error escapes `classify_header` the retry budget is already exhausted
/// and the resolver collapses it to an unresolved page.
#[async_trait]
pub trait HeaderClassifier: Send + Sync {
    /// Classify a header crop (PNG bytes) and return the model's code
    /// answer, [`UNKNOWN_REPLY`] when the model abstained.
    ///
    /// The returned string is the raw answer; blacklist filtering and
    /// normalization happen in the resolver.
    async fn classify_header(&self, header_png: &[u8]) -> SplitResult<String>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}
