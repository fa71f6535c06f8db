use std::path::Path;

use csv::WriterBuilder;

use crate::carrier::CarrierRecord;
use crate::error::ExtractError;
use crate::model::{CALL_COLUMNS, DURATION_COLUMN, NUMBER_COLUMN, RecordSet};
use crate::options::Whitelist;

fn is_one_minute(value: &str) -> bool {
    value
        .trim()
        .parse::<f64>()
        .is_ok_and(|minutes| (minutes - 1.0).abs() < f64::EPSILON)
}

/// One-minute calls to numbers outside the whitelist, projected onto the
/// Date, Time and Number columns.
pub(crate) fn select_short_calls(records: &RecordSet, whitelist: Option<&Whitelist>) -> RecordSet {
    let projection = CALL_COLUMNS
        .iter()
        .map(|column| records.column_index(column))
        .collect::<Vec<_>>();

    let rows = records
        .rows
        .iter()
        .filter(|row| records.value(row, DURATION_COLUMN).is_some_and(is_one_minute))
        .filter(|row| {
            let number = records.value(row, NUMBER_COLUMN).unwrap_or_default();
            !whitelist.is_some_and(|whitelist| whitelist.contains(number))
        })
        .map(|row| {
            projection
                .iter()
                .map(|index| index.and_then(|index| row.get(index)).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    RecordSet {
        columns: CALL_COLUMNS.iter().map(ToString::to_string).collect(),
        rows,
    }
}

fn create_parent(path: &Path) -> Result<(), ExtractError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub(crate) fn write_records(path: &Path, records: &RecordSet) -> Result<(), ExtractError> {
    create_parent(path)?;
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(&records.columns)?;
    for row in &records.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_carriers(path: &Path, carriers: &[CarrierRecord]) -> Result<(), ExtractError> {
    create_parent(path)?;
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(["Number", "Carrier"])?;
    for record in carriers {
        writer.write_record([record.number.as_str(), record.carrier.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}
