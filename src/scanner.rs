//! Locates the pages, and the rows within them, that hold the target
//! number's call sections.
//!
//! Every section on every page is introduced by the same key row; only the
//! rows just above it (the header slice) say whose section it is. The start
//! scan stops at the first key row whose slice names the target number, the
//! end scan at the first key row that names someone else, or at the first
//! page without any key row at all.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{ExtractError, ScanDiagnostics};
use crate::geometry::FALLBACK_END_KEY_INDEX;
use crate::model::{Grid, ScanBounds};
use crate::options::ScanOptions;
use crate::provider::PageGridProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StartPoint {
    page: u32,
    key_index: usize,
    first_section: bool,
}

pub struct BoundaryScanner<'a, P> {
    provider: &'a P,
    options: &'a ScanOptions,
    number_pattern: Regex,
}

impl<'a, P: PageGridProvider> BoundaryScanner<'a, P> {
    pub fn new(provider: &'a P, options: &'a ScanOptions) -> Result<Self, ExtractError> {
        let pattern = format!("^{}", regex::escape(options.search_number.trim()));
        let number_pattern = Regex::new(&pattern)
            .map_err(|error| ExtractError::InvalidOption(format!("search number: {error}")))?;
        Ok(Self {
            provider,
            options,
            number_pattern,
        })
    }

    /// Runs both passes and freezes the result.
    pub fn scan(&self) -> Result<ScanBounds, ExtractError> {
        let start = self.find_start_page()?;
        self.find_end_page(start)
    }

    /// Raw page read; unreadable pages count as pages without key rows.
    fn read_page(&self, page: u32) -> Grid {
        match self.provider.grid(page, None, false) {
            Ok(grid) => grid,
            Err(error) => {
                debug!(page, %error, "page unreadable during scan");
                Grid::default()
            }
        }
    }

    fn slice_names_target(&self, grid: &Grid, key_index: usize) -> bool {
        let first = key_index.saturating_sub(self.options.section_header_rows);
        (first..=key_index).any(|row| self.number_pattern.is_match(grid.first_cell(row)))
    }

    fn find_start_page(&self) -> Result<StartPoint, ExtractError> {
        for page in 1..=self.options.max_pages {
            let grid = self.read_page(page);
            let keys = grid.key_indices(&self.options.search_key);
            if let Some(position) = keys
                .iter()
                .position(|&key| self.slice_names_target(&grid, key))
            {
                let start = StartPoint {
                    page,
                    key_index: keys[position],
                    first_section: position == 0,
                };
                info!(
                    page,
                    key_index = start.key_index,
                    first_section = start.first_section,
                    "found start page"
                );
                return Ok(start);
            }
        }

        Err(ExtractError::StartNotFound {
            search_number: self.options.search_number.clone(),
            max_pages: self.options.max_pages,
        })
    }

    fn find_end_page(&self, start: StartPoint) -> Result<ScanBounds, ExtractError> {
        let gap = self.options.rows_between_sections;
        let mut valid_pages = vec![start.page];
        let bounds = |end_page: u32, end_page_key_index: usize, valid_pages: Vec<u32>| {
            info!(end_page, end_page_key_index, ?valid_pages, "found end page");
            ScanBounds {
                start_page: start.page,
                start_page_key_index: start.key_index,
                start_is_first_section: start.first_section,
                end_page,
                end_page_key_index,
                valid_pages,
            }
        };

        for page in start.page..=self.options.max_pages {
            if !valid_pages.contains(&page) {
                valid_pages.push(page);
            }

            let grid = self.read_page(page);
            let keys = grid.key_indices(&self.options.search_key);
            if keys.is_empty() {
                // Markers stopped appearing: every section has been seen.
                valid_pages.retain(|&valid| valid != page);
                let end_page = page.saturating_sub(1).max(start.page);
                return Ok(bounds(end_page, FALLBACK_END_KEY_INDEX, valid_pages));
            }

            if page == start.page {
                let next_key = keys.windows(2).find_map(|pair| {
                    self.slice_names_target(&grid, pair[0]).then_some(pair[1])
                });
                if let Some(next_key) = next_key {
                    return Ok(bounds(page, next_key.saturating_sub(gap), valid_pages));
                }
            } else if let Some(&foreign_key) = keys
                .iter()
                .find(|&&key| !self.slice_names_target(&grid, key))
            {
                return Ok(bounds(page, foreign_key.saturating_sub(gap), valid_pages));
            }
        }

        warn!(
            max_pages = self.options.max_pages,
            "section markers continue past the scan limit"
        );
        Err(ExtractError::EndNotFound {
            search_number: self.options.search_number.clone(),
            diagnostics: ScanDiagnostics {
                start_page: Some(start.page),
                start_page_key_index: Some(start.key_index),
                valid_pages,
                ..ScanDiagnostics::default()
            },
        })
    }
}
