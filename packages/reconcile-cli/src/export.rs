//! Output files: flat CSV exports and the text summary.

use anyhow::{Context, Result};
use reconcile::{review_rows, FlatRecord, Reconciliation, ReviewRow, Summary};
use std::borrow::Cow;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const CATALOG_FILE: &str = "catalog.csv";
pub const LOW_CONFIDENCE_FILE: &str = "low_confidence.csv";
pub const NEEDS_REVIEW_FILE: &str = "needs_review.csv";
pub const SUMMARY_FILE: &str = "summary.txt";

/// Quote a field if it contains a separator, quote or line break.
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Write a header row and data rows as UTF-8 CSV with a byte order mark.
pub fn write_csv<W: Write>(
    mut out: W,
    headers: &[&str],
    rows: impl IntoIterator<Item = Vec<String>>,
) -> io::Result<()> {
    // BOM for spreadsheet tools
    out.write_all("\u{feff}".as_bytes())?;
    write_row(&mut out, headers.iter().copied())?;
    for row in rows {
        write_row(&mut out, row.iter().map(String::as_str))?;
    }
    out.flush()
}

fn write_row<'a, W: Write>(out: &mut W, fields: impl Iterator<Item = &'a str>) -> io::Result<()> {
    let line = fields.map(csv_field).collect::<Vec<_>>().join(",");
    writeln!(out, "{line}")
}

fn create(path: &Path) -> Result<BufWriter<fs::File>> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write every export for a finished reconciliation into `dir`.
///
/// Returns the paths written.
pub fn write_outputs(dir: &Path, result: &Reconciliation) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let catalog_path = dir.join(CATALOG_FILE);
    write_csv(
        create(&catalog_path)?,
        &FlatRecord::HEADERS,
        result
            .merge
            .canonical
            .iter()
            .map(|record| FlatRecord::from(record).values()),
    )
    .with_context(|| format!("Failed to write {}", catalog_path.display()))?;

    let low_confidence_path = dir.join(LOW_CONFIDENCE_FILE);
    let mut headers = FlatRecord::HEADERS.to_vec();
    headers.push("drop_reason");
    write_csv(
        create(&low_confidence_path)?,
        &headers,
        result.merge.low_confidence.iter().map(|dropped| {
            let mut values = FlatRecord::from(&dropped.record).values();
            values.push(dropped.reason.to_string());
            values
        }),
    )
    .with_context(|| format!("Failed to write {}", low_confidence_path.display()))?;

    let review_path = dir.join(NEEDS_REVIEW_FILE);
    write_csv(
        create(&review_path)?,
        &ReviewRow::HEADERS,
        review_rows(&result.run).iter().map(ReviewRow::values),
    )
    .with_context(|| format!("Failed to write {}", review_path.display()))?;

    let summary_path = dir.join(SUMMARY_FILE);
    let summary = Summary::from_reconciliation(result);
    fs::write(&summary_path, summary.to_string())
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    let written = vec![catalog_path, low_confidence_path, review_path, summary_path];
    info!(dir = %dir.display(), files = written.len(), "Wrote exports");
    Ok(written)
}
