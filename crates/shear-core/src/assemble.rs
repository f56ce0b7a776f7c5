//! Output assembly: standalone PDFs, filenames, and the zip archive.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::decoder::PageDecoder;
use crate::error::{SplitError, SplitResult};
use crate::types::{OutputFile, PageGroup};

/// Name of the archive bundling every output file.
pub const ARCHIVE_NAME: &str = "split_reports.zip";

/// Marker deciding between the two filename templates.
const OUTSTANDING_MARKER: &str = "Outstanding";

/// Derive the output filename for a group.
///
/// The templates are an external compatibility contract and must match
/// exactly: `Rpt 614-{code} Outstanding.pdf` when the representative text
/// contains the marker, `Rpt 615-{code} MF.pdf` otherwise.
pub fn derive_filename(code: &str, representative_text: &str) -> String {
    if representative_text.contains(OUTSTANDING_MARKER) {
        format!("Rpt 614-{code} Outstanding.pdf")
    } else {
        format!("Rpt 615-{code} MF.pdf")
    }
}

/// Disambiguate repeated filenames within one run.
///
/// An institution whose report is interrupted and resumes later produces
/// two groups with the same code and template; a ` (n)` suffix keeps the
/// second from silently overwriting the first archive entry.
fn disambiguate(filename: String, seen: &mut HashMap<String, usize>) -> String {
    let count = seen.entry(filename.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        return filename;
    }

    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem} ({count}).{ext}"),
        None => format!("{filename} ({count})"),
    }
}

/// Build one standalone document per non-empty group.
///
/// Page content is excerpted, never modified. Empty groups should not
/// occur given the grouping invariants; they are skipped with a warning.
pub fn assemble(decoder: &dyn PageDecoder, groups: &[PageGroup]) -> SplitResult<Vec<OutputFile>> {
    let mut files = Vec::with_capacity(groups.len());
    let mut seen = HashMap::new();

    for group in groups {
        let Some(page_range) = group.page_range() else {
            warn!(label = %group.label, "skipping empty group");
            continue;
        };

        let content = decoder.extract_pages(&group.pages)?;
        let filename = disambiguate(
            derive_filename(group.label.as_code(), &group.representative_text),
            &mut seen,
        );

        debug!(
            filename = %filename,
            pages = group.pages.len(),
            "assembled output file"
        );

        files.push(OutputFile {
            filename,
            content,
            code: group.label.as_code().to_string(),
            page_count: group.pages.len(),
            page_range,
        });
    }

    Ok(files)
}

/// Bundle every output file into one deflate-compressed zip archive.
pub fn build_archive(files: &[OutputFile]) -> SplitResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for file in files {
        writer
            .start_file(file.filename.as_str(), options)
            .map_err(|e| SplitError::Archive(format!("{}: {e}", file.filename)))?;
        writer
            .write_all(&file.content)
            .map_err(|e| SplitError::Archive(format!("{}: {e}", file.filename)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| SplitError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}
