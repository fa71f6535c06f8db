/// Columns a call-detail table must expose to be accepted.
pub const CALL_COLUMNS: [&str; 3] = ["Date", "Time", "Number"];

pub const NUMBER_COLUMN: &str = "Number";
pub const DURATION_COLUMN: &str = "Min.";

/// One line of page text with its position. `offset` is the distance of the
/// baseline from the top edge of the page, `x` the left edge of the first
/// fragment, both in points.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub offset: f32,
    pub x: f32,
    pub text: String,
}

/// Grid of text cells read from one page (or one region of a page).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Grid {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    #[must_use]
    pub fn has_call_columns(&self) -> bool {
        CALL_COLUMNS
            .iter()
            .all(|name| self.column_index(name).is_some())
    }

    #[must_use]
    pub fn has_any_call_column(&self) -> bool {
        CALL_COLUMNS
            .iter()
            .any(|name| self.column_index(name).is_some())
    }

    /// Text of the first cell in `row`, empty when the row has no cells.
    #[must_use]
    pub fn first_cell(&self, row: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.first())
            .map_or("", String::as_str)
    }

    /// Indices of rows whose first cell contains `needle`.
    #[must_use]
    pub fn key_indices(&self, needle: &str) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&row| self.first_cell(row).contains(needle))
            .collect()
    }

    /// Whether any row lacks a value in `column`. A grid without that column
    /// is missing it everywhere.
    #[must_use]
    pub fn has_missing(&self, column: &str) -> bool {
        let Some(index) = self.column_index(column) else {
            return !self.rows.is_empty();
        };
        self.rows
            .iter()
            .any(|row| row.get(index).is_none_or(|cell| cell.trim().is_empty()))
    }

    /// Drops rows holding fewer than `min_filled` non-empty cells.
    pub fn retain_filled(&mut self, min_filled: usize) {
        self.rows.retain(|row| filled_cells(row) >= min_filled);
    }
}

#[must_use]
pub fn filled_cells(row: &[String]) -> usize {
    row.iter().filter(|cell| !cell.trim().is_empty()).count()
}

/// Immutable outcome of boundary scanning, consumed by region extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanBounds {
    pub start_page: u32,
    pub start_page_key_index: usize,
    pub start_is_first_section: bool,
    pub end_page: u32,
    pub end_page_key_index: usize,
    pub valid_pages: Vec<u32>,
}

/// Concatenated call rows from every valid page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RecordSet {
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    #[must_use]
    pub fn value<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        self.column_index(column)
            .and_then(|index| row.get(index))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::Grid;

    fn grid(columns: &[&str], rows: &[&[&str]]) -> Grid {
        Grid::new(
            columns.iter().map(ToString::to_string).collect(),
            rows.iter()
                .map(|row| row.iter().map(ToString::to_string).collect())
                .collect(),
        )
    }

    #[test]
    fn finds_key_rows_by_first_cell_substring() {
        let grid = grid(
            &[],
            &[
                &["555-123-4567 Jane"],
                &["Date Time Number Origin Min. Charge"],
                &["01/02 9:00AM 555-000-1111"],
                &["Date Time Number Origin Min. Charge"],
            ],
        );
        assert_eq!(grid.key_indices("Date Time Number"), vec![1, 3]);
        assert_eq!(grid.first_cell(9), "");
    }

    #[test]
    fn column_checks_distinguish_all_from_any() {
        let partial = grid(&["Date", "Origin"], &[]);
        assert!(partial.has_any_call_column());
        assert!(!partial.has_call_columns());

        let full = grid(&["Date", "Time", "Number", "Min."], &[]);
        assert!(full.has_call_columns());
    }

    #[test]
    fn missing_number_detection_covers_blank_and_short_rows() {
        let blank = grid(
            &["Date", "Time", "Number"],
            &[&["01/02", "9:00AM", "555"], &["Total", "", " "]],
        );
        assert!(blank.has_missing("Number"));

        let short = grid(&["Date", "Time", "Number"], &[&["01/02", "9:00AM"]]);
        assert!(short.has_missing("Number"));

        let complete = grid(&["Date", "Time", "Number"], &[&["01/02", "9:00AM", "555"]]);
        assert!(!complete.has_missing("Number"));
    }

    #[test]
    fn retain_filled_drops_sparse_rows() {
        let mut grid = grid(
            &["Date", "Time", "Number"],
            &[&["01/02", "9:00AM", "555"], &["Subtotal", "", ""]],
        );
        grid.retain_filled(3);
        assert_eq!(grid.row_count(), 1);
    }
}
