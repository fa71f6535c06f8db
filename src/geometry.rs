//! Letter-page geometry in PDF points (1/72 inch).
//!
//! All unit conversions used by the region search live here so the search
//! itself only deals in sliders and row counts.

pub const POINTS_PER_INCH: f32 = 72.0;
pub const PAGE_WIDTH: f32 = 8.5 * POINTS_PER_INCH;
pub const PAGE_HEIGHT: f32 = 11.0 * POINTS_PER_INCH;

/// Approximate height of one call-detail row.
pub const ROW_HEIGHT: f32 = 0.18 * POINTS_PER_INCH;

/// Running header printed at the top of every continuation page.
pub const PAGE_HEADER_OFFSET: f32 = 3.0 * POINTS_PER_INCH;

const TIGHT_BOTTOM_MARGIN: f32 = 0.5 * POINTS_PER_INCH;

/// Rows that fit on a full page, `round(11 / 0.18)`. Used as the end key
/// index when the section marker stops appearing altogether.
pub const FALLBACK_END_KEY_INDEX: usize = 61;

/// Rectangle passed to the grid provider, measured from the page's top-left
/// corner: top, left, bottom, right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

impl Region {
    #[must_use]
    pub fn contains_vertical(&self, offset: f32) -> bool {
        offset >= self.top && offset <= self.bottom
    }

    #[must_use]
    pub fn contains_horizontal(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }
}

/// Full-width rectangle starting `slider` of the way down the page.
#[must_use]
pub fn region_from_slider(slider: f32) -> Region {
    Region {
        top: slider * PAGE_HEIGHT,
        left: 0.0,
        bottom: PAGE_HEIGHT,
        right: PAGE_WIDTH,
    }
}

/// Window below the running page header tall enough for `end_key_index` rows.
#[must_use]
pub fn last_page_region(end_key_index: usize) -> Region {
    let rows = end_key_index as f32;
    Region {
        top: PAGE_HEADER_OFFSET,
        bottom: (PAGE_HEADER_OFFSET + rows * ROW_HEIGHT).min(PAGE_HEIGHT),
        ..region_from_slider(0.0)
    }
}

/// Cuts `region` off `row_span` rows (plus half an inch) below its top.
#[must_use]
pub fn tighten_bottom(region: Region, row_span: usize) -> Region {
    let rows = row_span as f32;
    Region {
        bottom: (region.top + rows * ROW_HEIGHT + TIGHT_BOTTOM_MARGIN).min(PAGE_HEIGHT),
        ..region
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FALLBACK_END_KEY_INDEX, PAGE_HEIGHT, PAGE_WIDTH, last_page_region, region_from_slider,
        tighten_bottom,
    };

    #[test]
    fn letter_page_is_612_by_792_points() {
        assert!((PAGE_WIDTH - 612.0).abs() < f32::EPSILON);
        assert!((PAGE_HEIGHT - 792.0).abs() < f32::EPSILON);
    }

    #[test]
    fn slider_maps_to_full_width_region() {
        let region = region_from_slider(0.5);
        assert!((region.top - 396.0).abs() < 1e-3);
        assert!((region.left - 0.0).abs() < f32::EPSILON);
        assert!((region.bottom - 792.0).abs() < f32::EPSILON);
        assert!((region.right - 612.0).abs() < f32::EPSILON);
        assert_eq!(region_from_slider(0.5), region);
    }

    #[test]
    fn fallback_end_index_matches_page_capacity() {
        let capacity = (11.0_f64 / 0.18).round();
        assert_eq!(FALLBACK_END_KEY_INDEX, capacity as usize);
    }

    #[test]
    fn last_page_region_starts_below_header_and_caps_at_page_bottom() {
        let short = last_page_region(10);
        assert!((short.top - 216.0).abs() < 1e-3);
        assert!((short.bottom - (216.0 + 129.6)).abs() < 1e-3);

        let long = last_page_region(FALLBACK_END_KEY_INDEX);
        assert!((long.bottom - 792.0).abs() < f32::EPSILON);
    }

    #[test]
    fn tightened_bottom_adds_half_inch_margin() {
        let region = tighten_bottom(region_from_slider(0.25), 5);
        assert!((region.top - 198.0).abs() < 1e-3);
        assert!((region.bottom - (198.0 + 64.8 + 36.0)).abs() < 1e-3);
        assert!((tighten_bottom(region_from_slider(0.9), 100).bottom - 792.0).abs() < f32::EPSILON);
    }
}
