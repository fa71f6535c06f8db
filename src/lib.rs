mod carrier;
mod error;
mod export;
mod extract;
mod geometry;
mod merge;
mod model;
mod options;
mod pdf_reader;
mod provider;
mod scanner;
mod table_parse;
mod warning;

use std::path::PathBuf;

use tracing::info;

use crate::export::{select_short_calls, write_records};
use crate::merge::merge_tables;
use crate::model::NUMBER_COLUMN;
use crate::warning::WarningCode;

pub use carrier::{
    CarrierLookup, CarrierRecord, CarrierResolver, DEFAULT_CARRIER_URL, HttpCarrierLookup,
    LookupOutcome, RetryPolicy, UNKNOWN_CARRIER,
};
pub use error::{ExtractError, ScanDiagnostics};
pub use export::write_carriers;
pub use extract::{MAX_ITERATIONS, PageTable, RegionExtractor, SLIDER_STEP};
pub use geometry::{Region, region_from_slider};
pub use merge::MIN_RECORD_FIELDS;
pub use model::{Grid, RecordSet, ScanBounds};
pub use options::{ScanOptions, Whitelist, normalize_number};
pub use pdf_reader::PdfGridProvider;
pub use provider::PageGridProvider;
pub use scanner::BoundaryScanner;
pub use warning::{ExtractWarning, WarningCode as ExtractWarningCode};

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionReport {
    pub bounds: ScanBounds,
    /// Records that survived the completeness filter.
    pub record_count: usize,
    /// Rows written to the output file.
    pub row_count: usize,
    /// Distinct numbers in the output, in first-seen order.
    pub numbers: Vec<String>,
    pub output_path: PathBuf,
    pub warnings: Vec<ExtractWarning>,
}

/// Scans, extracts and aggregates the target number's call records.
pub fn extract_call_records<P: PageGridProvider>(
    provider: &P,
    options: &ScanOptions,
    warnings: &mut Vec<ExtractWarning>,
) -> Result<(ScanBounds, RecordSet), ExtractError> {
    options.validate()?;

    let bounds = BoundaryScanner::new(provider, options)?.scan()?;
    let tables = RegionExtractor::new(provider, options, &bounds).extract(warnings)?;

    let (records, dropped) = merge_tables(&tables);
    if dropped > 0 {
        warnings.push(
            ExtractWarning::new(
                WarningCode::IncompleteRowsDropped,
                format!("dropped rows with fewer than {MIN_RECORD_FIELDS} fields"),
            )
            .with_rows(dropped),
        );
    }
    if records.rows.is_empty() {
        return Err(ExtractError::NoRecords {
            diagnostics: ScanDiagnostics::from(&bounds),
        });
    }

    info!(
        records = records.rows.len(),
        dropped,
        pages = tables.len(),
        "aggregated call records"
    );
    Ok((bounds, records))
}

/// Runs the whole pipeline over any grid provider and writes the filtered
/// calls to [`ScanOptions::output_path`].
pub fn extract_calls_to_csv<P: PageGridProvider>(
    provider: &P,
    options: &ScanOptions,
) -> Result<ExtractionReport, ExtractError> {
    let mut warnings = Vec::new();
    let (bounds, records) = extract_call_records(provider, options, &mut warnings)?;

    let selected = select_short_calls(&records, options.whitelist.as_ref());
    let output_path = options.output_path("");
    write_records(&output_path, &selected)?;
    info!(rows = selected.rows.len(), path = %output_path.display(), "exported calls");

    let mut numbers: Vec<String> = Vec::new();
    for number in selected
        .rows
        .iter()
        .filter_map(|row| selected.value(row, NUMBER_COLUMN))
    {
        if !number.is_empty() && !numbers.iter().any(|known| known == number) {
            numbers.push(number.to_string());
        }
    }

    Ok(ExtractionReport {
        bounds,
        record_count: records.rows.len(),
        row_count: selected.rows.len(),
        numbers,
        output_path,
        warnings,
    })
}

/// Opens `options.pdf_path` and runs [`extract_calls_to_csv`] over it.
pub fn extract_pdf_to_csv(options: &ScanOptions) -> Result<ExtractionReport, ExtractError> {
    options.validate()?;
    let provider = PdfGridProvider::open(&options.pdf_path)?;
    extract_calls_to_csv(&provider, options)
}
