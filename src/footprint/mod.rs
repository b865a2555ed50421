//! CCD footprint grouping
//!
//! The footprint dataset is a flat list of CCD-edge vertices, each tagged with
//! the sector it belongs to. Sectors are grouped into cycles of 13 by a fixed
//! external convention (cycle 1 = sectors 1–13, cycle 2 = 14–26, ...).
//! Selecting a cycle draws one polyline per sector of that cycle.

pub mod source;

pub use source::{FileFootprintSource, FootprintSource, HttpFootprintSource};

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::coordinates::SkyPosition;
use crate::error::FootprintError;
use crate::overlay::Drawable;

/// Sectors per cycle
pub const DEFAULT_RANGE_SIZE: u32 = 13;

const ID_COLUMN: usize = 0;
const RA_COLUMN: usize = 2;
const DEC_COLUMN: usize = 3;
const GROUP_COLUMN: usize = 6;

/// One vertex of the footprint dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FootprintRow {
    pub id: String,
    pub ra: f64,
    pub dec: f64,
    pub group_key: u32,
}

/// Read the footprint CSV: header row skipped, columns
/// `[id, _, ra, dec, _, _, group]`. Rows that do not parse are skipped.
pub fn parse_footprint_csv<R: Read>(reader: R) -> Result<Vec<FootprintRow>, FootprintError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        match parse_row(&record) {
            Some(row) => rows.push(row),
            None => {
                skipped += 1;
                tracing::warn!(
                    line = record.position().map(|p| p.line()).unwrap_or_default(),
                    "Skipping unparseable footprint row"
                );
            }
        }
    }
    tracing::debug!(rows = rows.len(), skipped, "Loaded footprint dataset");
    Ok(rows)
}

fn parse_row(record: &csv::StringRecord) -> Option<FootprintRow> {
    let ra = record.get(RA_COLUMN)?.parse::<f64>().ok()?;
    let dec = record.get(DEC_COLUMN)?.parse::<f64>().ok()?;
    let group_key = parse_group_key(record.get(GROUP_COLUMN)?)?;
    Some(FootprintRow {
        id: record.get(ID_COLUMN)?.to_string(),
        ra,
        dec,
        group_key,
    })
}

/// Accepts `"14"` and `"14.0"`
fn parse_group_key(field: &str) -> Option<u32> {
    if let Ok(key) = field.parse::<u32>() {
        return Some(key);
    }
    let value = field.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

/// Cycle a sector belongs to; sector 0 has none
pub fn cycle_for_sector(sector: u32, range_size: u32) -> Option<u32> {
    if sector == 0 || range_size == 0 {
        return None;
    }
    Some((sector - 1) / range_size + 1)
}

/// Vertices bucketed by group key, in dataset order within each bucket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FootprintGroups {
    groups: BTreeMap<u32, Vec<SkyPosition>>,
}

impl FootprintGroups {
    pub fn get(&self, key: u32) -> Option<&[SkyPosition]> {
        self.groups.get(&key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.groups.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Which groups of a range were drawn and which the dataset lacks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootprintSelection {
    pub range: u32,
    pub drawn: Vec<u32>,
    pub missing: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct FootprintGrouper {
    range_size: u32,
    line_width: f32,
}

impl Default for FootprintGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_RANGE_SIZE)
    }
}

impl FootprintGrouper {
    pub fn new(range_size: u32) -> Self {
        Self {
            range_size,
            line_width: 1.0,
        }
    }

    pub fn range_size(&self) -> u32 {
        self.range_size
    }

    /// Single pass over the rows; rows whose position is invalid are dropped
    pub fn group(&self, rows: &[FootprintRow]) -> FootprintGroups {
        let mut groups: BTreeMap<u32, Vec<SkyPosition>> = BTreeMap::new();
        for row in rows {
            match SkyPosition::new(row.ra, row.dec) {
                Ok(position) => groups.entry(row.group_key).or_default().push(position),
                Err(err) => tracing::warn!(id = %row.id, error = %err, "Dropping footprint vertex"),
            }
        }
        FootprintGroups { groups }
    }

    /// Group keys making up range `range` (1-based); range 0 is empty
    pub fn select_range(&self, range: u32) -> Vec<u32> {
        if range == 0 || self.range_size == 0 {
            return Vec::new();
        }
        let start = (range - 1).saturating_mul(self.range_size).saturating_add(1);
        let end = range.saturating_mul(self.range_size);
        (start..=end).collect()
    }

    /// One polyline per group of the range; groups absent from the dataset are
    /// skipped and reported in the selection
    pub fn polylines_for_range(
        &self,
        groups: &FootprintGroups,
        range: u32,
    ) -> (Vec<Drawable>, FootprintSelection) {
        let mut selection = FootprintSelection {
            range,
            ..FootprintSelection::default()
        };
        let mut drawables = Vec::new();
        for key in self.select_range(range) {
            match groups.get(key) {
                Some(vertices) => {
                    drawables.push(Drawable::Polyline {
                        vertices: vertices.to_vec(),
                        line_width: self.line_width,
                    });
                    selection.drawn.push(key);
                }
                None => selection.missing.push(key),
            }
        }
        (drawables, selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, ra: f64, dec: f64, group_key: u32) -> FootprintRow {
        FootprintRow {
            id: id.to_string(),
            ra,
            dec,
            group_key,
        }
    }

    fn pos(ra: f64, dec: f64) -> SkyPosition {
        SkyPosition::new(ra, dec).unwrap()
    }

    #[test]
    fn test_group_preserves_insertion_order() {
        let rows = vec![
            row("1", 0.0, 0.0, 1),
            row("2", 5.0, 5.0, 2),
            row("3", 1.0, 1.0, 1),
            row("4", 2.0, 2.0, 1),
        ];
        let groups = FootprintGrouper::default().group(&rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups.get(1).unwrap(),
            &[pos(0.0, 0.0), pos(1.0, 1.0), pos(2.0, 2.0)]
        );
    }

    #[test]
    fn test_select_range() {
        let grouper = FootprintGrouper::default();
        assert_eq!(grouper.select_range(1), (1..=13).collect::<Vec<_>>());
        assert_eq!(grouper.select_range(2), (14..=26).collect::<Vec<_>>());
        assert!(grouper.select_range(0).is_empty());
    }

    #[test]
    fn test_range_one_excludes_group_fourteen() {
        let rows = vec![
            row("1", 0.0, 0.0, 1),
            row("2", 1.0, 1.0, 1),
            row("3", 2.0, 2.0, 14),
        ];
        let grouper = FootprintGrouper::default();
        let groups = grouper.group(&rows);
        let (drawables, selection) = grouper.polylines_for_range(&groups, 1);

        assert_eq!(selection.drawn, vec![1]);
        assert_eq!(selection.missing, (2..=13).collect::<Vec<_>>());
        assert_eq!(
            drawables,
            vec![Drawable::Polyline {
                vertices: vec![pos(0.0, 0.0), pos(1.0, 1.0)],
                line_width: 1.0,
            }]
        );
    }

    #[test]
    fn test_cycle_for_sector() {
        assert_eq!(cycle_for_sector(1, 13), Some(1));
        assert_eq!(cycle_for_sector(13, 13), Some(1));
        assert_eq!(cycle_for_sector(14, 13), Some(2));
        assert_eq!(cycle_for_sector(0, 13), None);
    }

    #[test]
    fn test_parse_footprint_csv() {
        let csv = "id,camera,ra,dec,ccd,corner,sector\n\
                   1,1,0.0,0.0,1,1,1\n\
                   2,1,1.0,1.0,1,2,1\n\
                   3,1,not-a-number,1.0,1,3,1\n\
                   4,2,2.0,2.0,1,1,14.0\n";
        let rows = parse_footprint_csv(csv.as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![
                row("1", 0.0, 0.0, 1),
                row("2", 1.0, 1.0, 1),
                row("4", 2.0, 2.0, 14),
            ]
        );
    }

    #[test]
    fn test_parse_group_key() {
        assert_eq!(parse_group_key("7"), Some(7));
        assert_eq!(parse_group_key("7.0"), Some(7));
        assert_eq!(parse_group_key("7.5"), None);
        assert_eq!(parse_group_key("-1"), None);
    }
}
