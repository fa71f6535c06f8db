#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningCode {
    /// The last page needed the fixed-window fallback read.
    RegionFallback,
    /// The start page was located by the iterative region search.
    ConvergenceSearch,
    /// Rows below the completeness threshold were discarded.
    IncompleteRowsDropped,
    /// A number's carrier could not be resolved and was recorded as unknown.
    CarrierUnknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractWarning {
    pub code: WarningCode,
    pub message: String,
    pub page: Option<u32>,
    pub iterations: Option<usize>,
    pub rows: Option<usize>,
}

impl ExtractWarning {
    #[must_use]
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            page: None,
            iterations: None,
            rows: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = Some(iterations);
        self
    }

    #[must_use]
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }
}
