//! shear-pdf - PDFium-backed document decoding for shear.
//!
//! Implements the [`shear_core::PageDecoder`] seam on top of Google PDFium
//! via pdfium-render: whole-page and bounded-region text extraction, header
//! rasterization, and page-range excerpting into standalone documents.
//!
//! Requires the PDFium dynamic library at runtime; see
//! [`PdfiumDecoder::open`] for the discovery order.

mod pdfium;

pub use pdfium::PdfiumDecoder;
