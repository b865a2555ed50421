//! CSV export of displayed tables
//!
//! Pure functions: table in, CSV text out.

use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExportError;

/// A column-oriented table as the front-end holds it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnTable {
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl ColumnTable {
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    fn check_shape(&self) -> Result<usize, ExportError> {
        let rows = self.row_count();
        for column in &self.columns {
            if column.values.len() != rows {
                return Err(ExportError::RaggedColumn {
                    column: column.name.clone(),
                    expected: rows,
                    found: column.values.len(),
                });
            }
        }
        Ok(rows)
    }
}

/// Header line plus the selected rows, in selection order
pub fn export_selected(table: &ColumnTable, selected: &[usize]) -> Result<String, ExportError> {
    let rows = table.check_shape()?;
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(table.columns.iter().map(|c| c.name.as_str()))?;

    for &index in selected {
        if index >= rows {
            return Err(ExportError::RowOutOfRange { index, rows });
        }
        writer.write_record(table.columns.iter().map(|c| cell_text(&c.values[index])))?;
    }

    finish(writer)
}

/// Plain-text rendering of a cell: strings unquoted, null empty
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One row of the sector results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorResult {
    pub ra: f64,
    pub dec: f64,
    pub sector: u32,
    pub camera: u32,
    pub cycle: u32,
    pub obs_date: String,
}

/// Results download: RA and Dec are written only on the first row of each
/// target so the table reads as one block per target
pub fn sector_results_csv(results: &[SectorResult]) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(["RA", "Dec", "Sector", "Camera", "Cycle", "Observation Date"])?;

    let mut order: Vec<(f64, f64)> = Vec::new();
    for result in results {
        let key = (result.ra, result.dec);
        if !order.contains(&key) {
            order.push(key);
        }
    }

    for key in order {
        let block = results.iter().filter(|r| (r.ra, r.dec) == key);
        for (idx, result) in block.enumerate() {
            let (ra, dec) = if idx == 0 {
                (result.ra.to_string(), result.dec.to_string())
            } else {
                (String::new(), String::new())
            };
            writer.write_record([
                ra,
                dec,
                result.sector.to_string(),
                result.camera.to_string(),
                result.cycle.to_string(),
                result.obs_date.clone(),
            ])?;
        }
    }

    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))?;
    String::from_utf8(bytes).map_err(|_| ExportError::Encoding)
}
