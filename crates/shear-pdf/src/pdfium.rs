//! PDFium-backed implementation of the [`PageDecoder`] seam.
//!
//! Stateless per operation: every call loads a fresh `Pdfium` instance and
//! re-opens the document from the owned byte buffer, because the upstream
//! types are `!Send`. The OS caches `dlopen`/`LoadLibrary`, so repeat loads
//! are near-free, and no document handle ever outlives a call.

use std::io::Cursor;
use std::path::Path;

use image::ImageFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use shear_core::{PageDecoder, Region, SplitError, SplitResult};

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd zoom settings.
const MAX_DIMENSION_PX: u32 = 4096;

/// Decodes one source document for the duration of a run.
pub struct PdfiumDecoder {
    bytes: Vec<u8>,
    page_count: usize,
}

impl PdfiumDecoder {
    /// Open a document from an owned byte buffer.
    ///
    /// Fails fast if the PDFium library cannot be loaded or the document
    /// cannot be decoded, both fatal to the run.
    pub fn open(bytes: Vec<u8>) -> SplitResult<Self> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&bytes, None)
            .map_err(map_load_error)?;
        let page_count = document.pages().len() as usize;
        drop(document);

        debug!(pages = page_count, "opened source document");
        Ok(Self { bytes, page_count })
    }

    /// Open a document from a file path.
    pub fn open_path(path: impl AsRef<Path>) -> SplitResult<Self> {
        Self::open(std::fs::read(path)?)
    }
}

impl PageDecoder for PdfiumDecoder {
    fn page_count(&self) -> SplitResult<usize> {
        Ok(self.page_count)
    }

    fn page_text(&self, index: usize) -> SplitResult<String> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(map_load_error)?;
        let page = get_page(&document, index)?;

        let text = page.text().map_err(|e| SplitError::Page {
            page: index,
            reason: format!("text extraction failed: {e}"),
        })?;
        Ok(text.all())
    }

    fn region_text(&self, index: usize, region: Region) -> SplitResult<String> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(map_load_error)?;
        let page = get_page(&document, index)?;

        let text = page.text().map_err(|e| SplitError::Page {
            page: index,
            reason: format!("text extraction failed: {e}"),
        })?;
        Ok(text.inside_rect(to_pdf_rect(region, page.height().value)))
    }

    fn render_header(&self, index: usize, fraction: f32, zoom: f32) -> SplitResult<Vec<u8>> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(map_load_error)?;
        let page = get_page(&document, index)?;

        let (target_w, target_h) =
            compute_render_dimensions(page.width().value, page.height().value, zoom);

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| SplitError::Render {
                page: index,
                reason: format!("rendering failed: {e}"),
            })?;

        let full_page = bitmap.as_image();
        let crop_height = header_crop_height(full_page.height(), fraction);
        let header = full_page.crop_imm(0, 0, full_page.width(), crop_height);

        let mut cursor = Cursor::new(Vec::new());
        header
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| SplitError::Render {
                page: index,
                reason: format!("PNG encoding failed: {e}"),
            })?;

        debug!(
            page = index,
            width = header.width(),
            height = crop_height,
            "rendered header crop"
        );
        Ok(cursor.into_inner())
    }

    fn extract_pages(&self, pages: &[usize]) -> SplitResult<Vec<u8>> {
        if pages.is_empty() {
            return Err(SplitError::Document("empty page selection".to_string()));
        }

        let pdfium = load_pdfium()?;
        let source = pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(map_load_error)?;
        let mut output = pdfium
            .create_new_pdf()
            .map_err(|e| SplitError::Document(format!("failed to create output: {e}")))?;

        let range = page_range_string(pages);
        output
            .pages_mut()
            .copy_pages_from_document(&source, &range, 0)
            .map_err(|e| SplitError::Document(format!("failed to copy pages {range}: {e}")))?;

        output
            .save_to_bytes()
            .map_err(|e| SplitError::Document(format!("failed to serialize output: {e}")))
    }

    fn name(&self) -> &str {
        "pdfium"
    }
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to the library dir)
/// 2. Alongside the running executable
/// 3. System library search paths
fn load_pdfium() -> SplitResult<Pdfium> {
    if let Ok(dir) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(&dir);
        let bindings = Pdfium::bind_to_library(&lib_path).map_err(|e| {
            SplitError::Document(format!("failed to load PDFium from {dir}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        SplitError::Document(format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Map PDF load errors, detecting encrypted documents for clearer messages.
fn map_load_error(e: PdfiumError) -> SplitError {
    let msg = format!("{e}");
    if msg.to_lowercase().contains("password") {
        SplitError::Document("document is password-protected".to_string())
    } else {
        SplitError::Document(format!("failed to load document: {msg}"))
    }
}

fn get_page<'a>(
    document: &PdfDocument<'a>,
    index: usize,
) -> SplitResult<PdfPage<'a>> {
    let page_index = u16::try_from(index).map_err(|_| SplitError::Page {
        page: index,
        reason: "page index exceeds u16 maximum".to_string(),
    })?;

    document.pages().get(page_index).map_err(|_| SplitError::Page {
        page: index,
        reason: format!(
            "page out of range (document has {} pages)",
            document.pages().len()
        ),
    })
}

/// Convert a top-left-origin region to PDFium's bottom-up coordinates.
fn to_pdf_rect(region: Region, page_height: f32) -> PdfRect {
    PdfRect::new(
        PdfPoints::new(page_height - region.y1),
        PdfPoints::new(region.x0),
        PdfPoints::new(page_height - region.y0),
        PdfPoints::new(region.x1),
    )
}

/// Compute pixel dimensions for rendering at `zoom` pixels per point,
/// capped to [`MAX_DIMENSION_PX`] with the aspect ratio preserved.
fn compute_render_dimensions(width_points: f32, height_points: f32, zoom: f32) -> (u32, u32) {
    let raw_w = (width_points * zoom).max(1.0);
    let raw_h = (height_points * zoom).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        warn!(
            raw_width = raw_w,
            raw_height = raw_h,
            "render dimensions capped to {MAX_DIMENSION_PX}px"
        );
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

/// Header crop height in pixels, at least one row and at most the page.
fn header_crop_height(page_height_px: u32, fraction: f32) -> u32 {
    let fraction = fraction.clamp(0.01, 1.0);
    ((page_height_px as f32 * fraction).round() as u32).clamp(1, page_height_px.max(1))
}

/// 1-based page selection string in FPDF_ImportPages syntax, with
/// consecutive indices collapsed into ranges: `[0,1,2,6]` -> `"1-3,7"`.
fn page_range_string(pages: &[usize]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run_start = pages[0];
    let mut run_end = pages[0];

    for &page in &pages[1..] {
        if page == run_end + 1 {
            run_end = page;
        } else {
            parts.push(format_run(run_start, run_end));
            run_start = page;
            run_end = page;
        }
    }
    parts.push(format_run(run_start, run_end));

    parts.join(",")
}

fn format_run(start: usize, end: usize) -> String {
    if start == end {
        format!("{}", start + 1)
    } else {
        format!("{}-{}", start + 1, end + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_range_single_page() {
        assert_eq!(page_range_string(&[0]), "1");
        assert_eq!(page_range_string(&[41]), "42");
    }

    #[test]
    fn test_page_range_contiguous_run() {
        assert_eq!(page_range_string(&[0, 1, 2]), "1-3");
    }

    #[test]
    fn test_page_range_mixed_runs() {
        assert_eq!(page_range_string(&[0, 1, 2, 6, 8, 9]), "1-3,7,9-10");
    }

    #[test]
    fn test_region_coordinate_flip() {
        // Top-left (10,10)-(250,150) on a 792pt page becomes a bottom-up
        // rect with bottom = 792-150 and top = 792-10.
        let rect = to_pdf_rect(Region::new(10.0, 10.0, 250.0, 150.0), 792.0);
        assert_eq!(rect.bottom.value, 642.0);
        assert_eq!(rect.left.value, 10.0);
        assert_eq!(rect.top.value, 782.0);
        assert_eq!(rect.right.value, 250.0);
    }

    #[test]
    fn test_render_dimensions_at_zoom_3() {
        // US Letter at the default zoom.
        let (w, h) = compute_render_dimensions(612.0, 792.0, 3.0);
        assert_eq!(w, 1836);
        assert_eq!(h, 2376);
    }

    #[test]
    fn test_render_dimensions_capped() {
        let (w, h) = compute_render_dimensions(5000.0, 7000.0, 3.0);
        assert!(w <= MAX_DIMENSION_PX);
        assert!(h <= MAX_DIMENSION_PX);
        let ratio = h as f32 / w as f32;
        assert!((ratio - 1.4).abs() < 0.01);
    }

    #[test]
    fn test_header_crop_height() {
        assert_eq!(header_crop_height(2376, 0.3), 713);
        assert_eq!(header_crop_height(100, 1.0), 100);
        // Fraction is clamped away from zero.
        assert_eq!(header_crop_height(100, 0.0), 1);
    }
}
