use crate::extract::PageTable;
use crate::model::{RecordSet, filled_cells};

/// Rows with fewer non-empty fields than this are not call records.
pub const MIN_RECORD_FIELDS: usize = 6;

/// Concatenates page tables in order under the union of their columns and
/// drops incomplete rows. Returns the record set and the number of rows
/// dropped.
pub(crate) fn merge_tables(tables: &[PageTable]) -> (RecordSet, usize) {
    let mut columns: Vec<String> = Vec::new();
    for table in tables {
        for column in &table.grid.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }

    let mut rows = Vec::new();
    let mut dropped = 0_usize;
    for table in tables {
        let positions = table
            .grid
            .columns
            .iter()
            .map(|column| columns.iter().position(|known| known == column))
            .collect::<Vec<_>>();

        for source in &table.grid.rows {
            if filled_cells(source) < MIN_RECORD_FIELDS {
                dropped += 1;
                continue;
            }
            let mut row = vec![String::new(); columns.len()];
            for (cell, position) in source.iter().zip(&positions) {
                if let Some(position) = position {
                    row[*position].clone_from(cell);
                }
            }
            rows.push(row);
        }
    }

    (RecordSet { columns, rows }, dropped)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::merge_tables;
    use crate::extract::PageTable;
    use crate::model::Grid;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn concatenates_in_page_order_and_drops_short_rows() {
        let tables = vec![
            PageTable {
                page: 3,
                grid: Grid::new(
                    strings(&["Date", "Time", "Number", "Origin", "Min.", "Charge"]),
                    vec![
                        strings(&["01/05", "10:15AM", "555-201-0001", "Incoming", "1", "0.00"]),
                        strings(&["Subtotal", "", "", "", "4", "0.00"]),
                    ],
                ),
            },
            PageTable {
                page: 4,
                grid: Grid::new(
                    strings(&["Date", "Time", "Number", "Origin", "Min.", "Charge", "Feature"]),
                    vec![strings(&[
                        "01/06", "9:00PM", "555-201-0002", "Dallas TX", "12", "0.00", "M2M",
                    ])],
                ),
            },
        ];

        let (records, dropped) = merge_tables(&tables);

        assert_eq!(dropped, 1);
        assert_eq!(
            records.columns,
            strings(&["Date", "Time", "Number", "Origin", "Min.", "Charge", "Feature"])
        );
        assert_eq!(records.rows.len(), 2);
        assert_eq!(records.rows[0][6], "");
        assert_eq!(records.rows[1][2], "555-201-0002");
        assert!(records.rows.iter().all(|row| {
            row.iter().filter(|cell| !cell.is_empty()).count() >= 6
        }));
    }

    #[test]
    fn aligns_columns_by_name_across_pages() {
        let tables = vec![
            PageTable {
                page: 1,
                grid: Grid::new(strings(&["Date", "Time", "Number"]), Vec::new()),
            },
            PageTable {
                page: 2,
                grid: Grid::new(
                    strings(&["Time", "Date", "Number", "a", "b", "c"]),
                    vec![strings(&["9:00PM", "01/06", "555", "x", "y", "z"])],
                ),
            },
        ];

        let (records, _) = merge_tables(&tables);
        assert_eq!(records.value(&records.rows[0], "Date"), Some("01/06"));
        assert_eq!(records.value(&records.rows[0], "Time"), Some("9:00PM"));
    }
}
