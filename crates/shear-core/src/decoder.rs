//! The document decoder seam.
//!
//! The pipeline never touches a PDF library directly; it goes through
//! [`PageDecoder`], which a backend crate implements. Methods are scoped to
//! one page so implementations can stay stateless per operation.

use crate::error::SplitResult;
use crate::types::Region;

/// Page-level access to the source document.
pub trait PageDecoder: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> SplitResult<usize>;

    /// Plain text of the whole page.
    fn page_text(&self, index: usize) -> SplitResult<String>;

    /// Text inside a sub-rectangle of the page.
    fn region_text(&self, index: usize, region: Region) -> SplitResult<String>;

    /// PNG raster of the top `fraction` of the page at `zoom` pixels per
    /// PDF point.
    fn render_header(&self, index: usize, fraction: f32, zoom: f32) -> SplitResult<Vec<u8>>;

    /// A standalone document containing exactly `pages`, in the given order.
    fn extract_pages(&self, pages: &[usize]) -> SplitResult<Vec<u8>>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}
