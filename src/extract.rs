//! Per-page extraction of the target's call rows.
//!
//! Middle pages hold nothing but the target's calls, so a layout-guessed read
//! is enough. The last page falls back to a fixed window below the running
//! header. A start page shared with other sections needs the region search:
//! a full-width window whose top edge walks up or down the page until the
//! window's first line is the target's column header.

use tracing::{debug, info, warn};

use crate::error::{ExtractError, ScanDiagnostics};
use crate::geometry::{Region, last_page_region, region_from_slider, tighten_bottom};
use crate::model::{Grid, NUMBER_COLUMN, ScanBounds};
use crate::options::ScanOptions;
use crate::provider::PageGridProvider;
use crate::warning::{ExtractWarning, WarningCode};

pub const MAX_ITERATIONS: usize = 500;
pub const SLIDER_STEP: f32 = 0.01;

/// Rows returned by the region search must carry at least this many values.
const MIN_REGION_ROW_FIELDS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    pub page: u32,
    pub grid: Grid,
}

/// A window starting at the target's header sees that header plus every
/// later key row on the page. One starting at a later section's header sees
/// fewer.
fn window_holds_candidates(grid: &Grid, lead: &str, candidates: &[usize]) -> bool {
    if candidates.is_empty() {
        return true;
    }
    let header = grid.columns.first().is_some_and(|name| name.contains(lead));
    grid.key_indices(lead).len() + usize::from(header) == candidates.len()
}

pub struct RegionExtractor<'a, P> {
    provider: &'a P,
    options: &'a ScanOptions,
    bounds: &'a ScanBounds,
}

impl<'a, P: PageGridProvider> RegionExtractor<'a, P> {
    pub fn new(provider: &'a P, options: &'a ScanOptions, bounds: &'a ScanBounds) -> Self {
        Self {
            provider,
            options,
            bounds,
        }
    }

    /// Extracts every valid page in ascending order. Any page that cannot be
    /// extracted aborts the run.
    pub fn extract(
        &self,
        warnings: &mut Vec<ExtractWarning>,
    ) -> Result<Vec<PageTable>, ExtractError> {
        let mut tables = Vec::with_capacity(self.bounds.valid_pages.len());
        for &page in &self.bounds.valid_pages {
            let grid = if page == self.bounds.start_page {
                self.start_page_extract(page, warnings)?
            } else if page == self.bounds.end_page {
                self.last_page_extract(page, warnings)?
            } else {
                self.simple_extract(page)
                    .map_err(|_| ExtractError::TableNotFound {
                        page,
                        diagnostics: ScanDiagnostics::from(self.bounds),
                    })?
            };
            info!(page, rows = grid.row_count(), "extracted page");
            tables.push(PageTable { page, grid });
        }
        Ok(tables)
    }

    fn simple_extract(&self, page: u32) -> Result<Grid, ExtractError> {
        let grid = self.provider.grid(page, None, true)?;
        if grid.has_call_columns() {
            Ok(grid)
        } else {
            Err(ExtractError::PageRejected { page })
        }
    }

    /// Region read where an unreadable region counts as an empty grid.
    fn read_region(&self, page: u32, region: Region) -> Grid {
        self.provider
            .grid(page, Some(region), false)
            .unwrap_or_else(|error| {
                debug!(page, ?region, %error, "region read failed");
                Grid::default()
            })
    }

    fn start_page_extract(
        &self,
        page: u32,
        warnings: &mut Vec<ExtractWarning>,
    ) -> Result<Grid, ExtractError> {
        if !self.bounds.start_is_first_section {
            return self.complex_extract(page, warnings);
        }
        match self.simple_extract(page) {
            Ok(grid) => Ok(grid),
            Err(error) if error.is_recoverable() => {
                debug!(page, %error, "simple read of start page failed; searching regions");
                self.complex_extract(page, warnings)
            }
            Err(error) => Err(error),
        }
    }

    fn last_page_extract(
        &self,
        page: u32,
        warnings: &mut Vec<ExtractWarning>,
    ) -> Result<Grid, ExtractError> {
        match self.simple_extract(page) {
            Ok(grid) => return Ok(grid),
            Err(error) => debug!(page, %error, "simple read of last page failed"),
        }

        let region = last_page_region(self.bounds.end_page_key_index);
        let grid = self.read_region(page, region);
        if !grid.has_call_columns() {
            return Err(ExtractError::LastPageUnreadable {
                page,
                diagnostics: ScanDiagnostics::from(self.bounds),
            });
        }

        warn!(page, bottom = region.bottom, "last page read through fixed window");
        warnings.push(
            ExtractWarning::new(
                WarningCode::RegionFallback,
                "last page needed a fixed window below the page header",
            )
            .with_page(page)
            .with_rows(grid.row_count()),
        );
        Ok(grid)
    }

    fn complex_extract(
        &self,
        page: u32,
        warnings: &mut Vec<ExtractWarning>,
    ) -> Result<Grid, ExtractError> {
        let start_key = self.bounds.start_page_key_index;
        let initial = self.provider.grid(page, None, false).unwrap_or_default();
        let total_rows = initial.row_count();
        let candidates = initial
            .key_indices(&self.options.search_key)
            .into_iter()
            .filter(|&index| index >= start_key)
            .collect::<Vec<_>>();

        let mut slider = if total_rows == 0 {
            0.0
        } else {
            start_key as f32 / total_rows as f32
        };
        let lead = self.options.key_lead();
        let mut region = region_from_slider(slider);
        let mut grid = self.read_region(page, region);
        if grid.has_call_columns() && window_holds_candidates(&grid, lead, &candidates) {
            return Ok(grid);
        }

        let single_page = self.bounds.start_page == self.bounds.end_page;
        let mut last_indices = Vec::new();

        for iteration in 1..=MAX_ITERATIONS {
            last_indices = grid.key_indices(lead);
            if last_indices.len() < candidates.len() {
                slider -= SLIDER_STEP;
            } else {
                slider += SLIDER_STEP;
            }
            region = region_from_slider(slider);
            grid = self.read_region(page, region);
            debug!(page, iteration, slider, keys = last_indices.len(), "region search step");

            if !grid.has_any_call_column() {
                continue;
            }
            if !window_holds_candidates(&grid, lead, &candidates) {
                debug!(page, iteration, slider, "window header belongs to another section");
                continue;
            }

            if single_page && grid.has_missing(NUMBER_COLUMN) {
                // Another section follows within the window; cut it off.
                let row_span = self.bounds.end_page_key_index.saturating_sub(start_key);
                grid = self.read_region(page, tighten_bottom(region, row_span));
                if grid.has_call_columns() {
                    self.record_convergence(page, iteration, slider, warnings);
                    return Ok(grid);
                }
                continue;
            }

            grid.retain_filled(MIN_REGION_ROW_FIELDS);
            self.record_convergence(page, iteration, slider, warnings);
            return Ok(grid);
        }

        Err(ExtractError::ConvergenceExhausted {
            page,
            diagnostics: ScanDiagnostics {
                total_rows: Some(total_rows),
                candidate_indices: candidates,
                last_indices,
                iterations: Some(MAX_ITERATIONS),
                slider: Some(slider),
                ..ScanDiagnostics::from(self.bounds)
            },
        })
    }

    fn record_convergence(
        &self,
        page: u32,
        iteration: usize,
        slider: f32,
        warnings: &mut Vec<ExtractWarning>,
    ) {
        info!(page, iteration, slider, "region search converged");
        warnings.push(
            ExtractWarning::new(
                WarningCode::ConvergenceSearch,
                format!("call table located at {:.0}% of the page height", slider * 100.0),
            )
            .with_page(page)
            .with_iterations(iteration),
        );
    }
}
