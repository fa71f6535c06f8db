use crate::error::ExtractError;
use crate::geometry::Region;
use crate::model::Grid;

/// Source of per-page cell grids.
///
/// With `guess_layout` and no region, the provider detects the first table on
/// the page and uses its first row as the header. With a region, only text
/// inside the rectangle is read and its first line becomes the header.
/// Without either, every text line is returned as a single-cell row.
///
/// A grid that lacks the expected columns is a normal answer; `Err` is
/// reserved for pages that yield nothing parseable.
pub trait PageGridProvider {
    fn grid(
        &self,
        page: u32,
        region: Option<Region>,
        guess_layout: bool,
    ) -> Result<Grid, ExtractError>;
}

impl<T: PageGridProvider + ?Sized> PageGridProvider for &T {
    fn grid(
        &self,
        page: u32,
        region: Option<Region>,
        guess_layout: bool,
    ) -> Result<Grid, ExtractError> {
        (**self).grid(page, region, guess_layout)
    }
}
