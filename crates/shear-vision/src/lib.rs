//! shear-vision - AI fallback classification for shear.
//!
//! Implements the [`shear_core::HeaderClassifier`] seam against Google's
//! Gemini vision API. Used only when the rule extractor abstains; running
//! without this crate's classifier is a supported degraded mode.
//!
//! # Example
//!
//! ```ignore
//! use shear_vision::GeminiClassifier;
//!
//! let classifier = GeminiClassifier::new(api_key);
//! let code = classifier.classify_header(&header_png).await?;
//! ```

mod gemini;

pub use gemini::GeminiClassifier;
