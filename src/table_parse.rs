use std::collections::HashMap;

use crate::geometry::Region;
use crate::model::{Grid, TextLine};

/// Tables whose row widths disagree more than this are passed over when a
/// more regular table exists on the same page.
pub(crate) const LOW_CONFIDENCE_THRESHOLD: f32 = 0.60;

/// Splits a line on tabs and on runs of two or more spaces.
pub(crate) fn split_cells(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut spaces = 0_usize;

    let mut flush = |current: &mut String| {
        let cell = current.trim();
        if !cell.is_empty() {
            cells.push(cell.to_string());
        }
        current.clear();
    };

    for ch in line.trim().chars() {
        match ch {
            '\t' => {
                flush(&mut current);
                spaces = 0;
            }
            ch if ch.is_whitespace() => {
                spaces += 1;
                if spaces == 2 {
                    flush(&mut current);
                } else if spaces == 1 {
                    current.push(' ');
                }
            }
            ch => {
                spaces = 0;
                current.push(ch);
            }
        }
    }
    flush(&mut current);

    cells
}

pub(crate) fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn modal_width(rows: &[Vec<String>]) -> usize {
    let mut freq = HashMap::new();
    for width in rows.iter().map(Vec::len) {
        *freq.entry(width).or_insert(0_usize) += 1;
    }

    freq.into_iter()
        .max_by_key(|(width, count)| (*count, *width))
        .map_or(0, |(width, _)| width)
}

fn table_confidence(rows: &[Vec<String>]) -> f32 {
    let modal = modal_width(rows);
    if rows.len() < 2 || modal == 0 {
        return 0.0;
    }

    let consistent =
        rows.iter().filter(|row| row.len() == modal).count() as f32 / rows.len() as f32;
    let widest = rows.iter().map(Vec::len).max().unwrap_or(modal);
    let narrowest = rows.iter().map(Vec::len).min().unwrap_or(modal);
    let uniformity = 1.0 - (widest - narrowest) as f32 / widest as f32;

    (consistent * 0.75 + uniformity * 0.25).clamp(0.0, 1.0)
}

/// Header row becomes the column names; ragged rows are padded, and cells
/// beyond the header get positional names.
fn grid_from_rows(mut rows: Vec<Vec<String>>) -> Grid {
    if rows.is_empty() {
        return Grid::default();
    }

    let mut columns = rows.remove(0);
    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(columns.len());
    let named = columns.len();
    columns.extend((named + 1..=width).map(|index| format!("col_{index}")));

    for row in &mut rows {
        row.resize(width, String::new());
    }

    Grid::new(columns, rows)
}

/// One single-cell row per line. No column inference.
pub(crate) fn raw_grid(lines: &[TextLine]) -> Grid {
    let rows = lines
        .iter()
        .map(|line| vec![collapse_whitespace(&line.text)])
        .collect();
    Grid::new(Vec::new(), rows)
}

/// Lines inside `region`, first line taken as the header.
pub(crate) fn region_grid(lines: &[TextLine], region: &Region) -> Grid {
    let rows = lines
        .iter()
        .filter(|line| region.contains_vertical(line.offset) && region.contains_horizontal(line.x))
        .map(|line| split_cells(&line.text))
        .filter(|cells| !cells.is_empty())
        .collect();
    grid_from_rows(rows)
}

/// Runs of at least two consecutive multi-cell lines.
fn detect_tables(lines: &[TextLine]) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in lines {
        let cells = split_cells(&line.text);
        if cells.len() >= 2 {
            current.push(cells);
            continue;
        }
        if current.len() >= 2 {
            tables.push(std::mem::take(&mut current));
        } else {
            current.clear();
        }
    }
    if current.len() >= 2 {
        tables.push(current);
    }

    tables
}

/// First table on the page, preferring regular tables over ragged ones.
pub(crate) fn guessed_grid(lines: &[TextLine]) -> Option<Grid> {
    let tables = detect_tables(lines);
    let index = tables
        .iter()
        .position(|rows| table_confidence(rows) >= LOW_CONFIDENCE_THRESHOLD)
        .or_else(|| (!tables.is_empty()).then_some(0))?;
    tables.into_iter().nth(index).map(grid_from_rows)
}
