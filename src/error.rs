use std::fmt::{Display, Formatter};
use std::io;

use thiserror::Error;

use crate::model::ScanBounds;

/// Scan and search state attached to every fatal extraction error so a failed
/// run can be reproduced from the log alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanDiagnostics {
    pub start_page: Option<u32>,
    pub end_page: Option<u32>,
    pub start_page_key_index: Option<usize>,
    pub end_page_key_index: Option<usize>,
    pub valid_pages: Vec<u32>,
    pub total_rows: Option<usize>,
    pub candidate_indices: Vec<usize>,
    pub last_indices: Vec<usize>,
    pub iterations: Option<usize>,
    pub slider: Option<f32>,
}

impl From<&ScanBounds> for ScanDiagnostics {
    fn from(bounds: &ScanBounds) -> Self {
        Self {
            start_page: Some(bounds.start_page),
            end_page: Some(bounds.end_page),
            start_page_key_index: Some(bounds.start_page_key_index),
            end_page_key_index: Some(bounds.end_page_key_index),
            valid_pages: bounds.valid_pages.clone(),
            ..Self::default()
        }
    }
}

impl Display for ScanDiagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "start_page={:?} end_page={:?} start_page_key_index={:?} end_page_key_index={:?} valid_pages={:?}",
            self.start_page,
            self.end_page,
            self.start_page_key_index,
            self.end_page_key_index,
            self.valid_pages
        )?;
        if let Some(total_rows) = self.total_rows {
            write!(f, " total_rows={total_rows}")?;
        }
        if !self.candidate_indices.is_empty() {
            write!(f, " candidate_indices={:?}", self.candidate_indices)?;
        }
        if let Some(iterations) = self.iterations {
            write!(f, " last_indices={:?} iterations={iterations}", self.last_indices)?;
        }
        if let Some(slider) = self.slider {
            write!(f, " slider={slider:.2}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("page {page} could not be read: {reason}")]
    PageUnreadable { page: u32, reason: String },

    #[error("page {page} does not hold a Date/Time/Number table")]
    PageRejected { page: u32 },

    #[error("unable to identify the start page for '{search_number}' within {max_pages} pages")]
    StartNotFound { search_number: String, max_pages: u32 },

    #[error("unable to identify the end page for '{search_number}' ({diagnostics})")]
    EndNotFound {
        search_number: String,
        diagnostics: ScanDiagnostics,
    },

    #[error("unable to extract call data from page {page} ({diagnostics})")]
    TableNotFound {
        page: u32,
        diagnostics: ScanDiagnostics,
    },

    #[error("unable to extract call data from last page {page} ({diagnostics})")]
    LastPageUnreadable {
        page: u32,
        diagnostics: ScanDiagnostics,
    },

    #[error("region search on page {page} hit the iteration limit ({diagnostics})")]
    ConvergenceExhausted {
        page: u32,
        diagnostics: ScanDiagnostics,
    },

    #[error("no call records survived extraction ({diagnostics})")]
    NoRecords { diagnostics: ScanDiagnostics },

    #[error("carrier lookup failed for {failures} numbers; check the API key and service status")]
    CircuitOpen { failures: usize },
}

impl ExtractError {
    /// True for the per-read failures the region search recovers from.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PageUnreadable { .. } | Self::PageRejected { .. })
    }
}
