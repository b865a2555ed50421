//! Coordinate parsing and input classification
//!
//! Every raw string typed into the target field is classified into exactly one
//! [`InputKind`] or rejected. Rules are checked in order, first match wins:
//!
//! 1. `<float>,<float>` → [`InputKind::Coordinates`] (RA first, Dec second)
//! 2. `TIC...` prefix (any case) or a plain number → [`InputKind::CatalogId`]
//! 3. anything else → [`InputKind::Name`]
//!
//! Blank input is rejected. No range validation happens here; that is the
//! resolver's job.

use std::fmt;

use nom::{
    branch::alt,
    character::complete::{char, digit0, digit1, multispace0, one_of},
    combinator::{all_consuming, map_res, opt, recognize},
    sequence::{delimited, pair, separated_pair, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of the canonical TESS Input Catalog identifier
pub const TIC_PREFIX: &str = "TIC";

/// A validated position on the celestial sphere, in degrees
///
/// RA is normalised into `[0, 360)`, Dec is within `[-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyPosition {
    pub ra: f64,
    pub dec: f64,
}

/// Why a raw coordinate pair cannot become a [`SkyPosition`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidPosition {
    #[error("non-finite coordinate (ra={ra}, dec={dec})")]
    NonFinite { ra: f64, dec: f64 },

    #[error("declination {dec} outside [-90, 90]")]
    DeclinationOutOfRange { dec: f64 },
}

impl SkyPosition {
    pub fn new(ra: f64, dec: f64) -> Result<Self, InvalidPosition> {
        if !ra.is_finite() || !dec.is_finite() {
            return Err(InvalidPosition::NonFinite { ra, dec });
        }
        if !(-90.0..=90.0).contains(&dec) {
            return Err(InvalidPosition::DeclinationOutOfRange { dec });
        }
        let ra = ra.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360.0 for tiny negative inputs
        let ra = if ra >= 360.0 { 0.0 } else { ra };
        Ok(Self { ra, dec })
    }

    /// Popup description used on target markers
    pub fn describe(&self) -> String {
        format!("RA: {:.6}, Dec: {:.6}", self.ra, self.dec)
    }
}

impl fmt::Display for SkyPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.ra, self.dec)
    }
}

/// Canonical catalog identifier, always of the form `"TIC <number>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogId {
    canonical: String,
}

impl CatalogId {
    /// Build from a bare catalog number (`"42"` → `"TIC 42"`)
    pub fn from_number(number: impl fmt::Display) -> Self {
        Self {
            canonical: format!("{} {}", TIC_PREFIX, number.to_string().trim()),
        }
    }

    /// Build from user text that either carries the prefix or is a number
    pub(crate) fn from_text(trimmed: &str) -> Self {
        match strip_tic_prefix(trimmed) {
            Some(rest) => Self::from_number(rest),
            None => Self::from_number(trimmed),
        }
    }

    /// Full identifier, e.g. `"TIC 42"`
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Identifier without the prefix, e.g. `"42"`
    pub fn number(&self) -> &str {
        self.canonical[TIC_PREFIX.len()..].trim_start()
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// The closed set of input kinds a raw string can map to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputKind {
    /// Raw pair as typed; not range checked
    Coordinates { ra: f64, dec: f64 },
    CatalogId { id: CatalogId },
    Name { text: String },
}

impl InputKind {
    /// Short strategy name used in logs
    pub fn strategy(&self) -> &'static str {
        match self {
            InputKind::Coordinates { .. } => "coordinates",
            InputKind::CatalogId { .. } => "catalog",
            InputKind::Name { .. } => "name",
        }
    }
}

/// Classify raw user input. `None` means the input is rejected (blank) and
/// must not trigger any resolution attempt or user-visible error.
pub fn classify(raw: &str) -> Option<InputKind> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok((_, (ra, dec))) = coordinate_pair(raw) {
        return Some(InputKind::Coordinates { ra, dec });
    }

    if strip_tic_prefix(trimmed).is_some() || plain_number(trimmed).is_ok() {
        return Some(InputKind::CatalogId {
            id: CatalogId::from_text(trimmed),
        });
    }

    Some(InputKind::Name {
        text: trimmed.to_string(),
    })
}

/// Returns the remainder after a case-insensitive `TIC` prefix
fn strip_tic_prefix(trimmed: &str) -> Option<&str> {
    let head = trimmed.get(..TIC_PREFIX.len())?;
    if head.eq_ignore_ascii_case(TIC_PREFIX) {
        Some(trimmed[TIC_PREFIX.len()..].trim())
    } else {
        None
    }
}

/// `-?\d+(\.\d*)?`
fn signed_decimal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit0)))))(input)
}

fn coordinate_value(input: &str) -> IResult<&str, f64> {
    map_res(signed_decimal, |s: &str| s.parse::<f64>())(input)
}

/// `^\s*<decimal>\s*,\s*<decimal>\s*$`
fn coordinate_pair(input: &str) -> IResult<&str, (f64, f64)> {
    all_consuming(delimited(
        multispace0,
        separated_pair(
            coordinate_value,
            tuple((multispace0, char(','), multispace0)),
            coordinate_value,
        ),
        multispace0,
    ))(input)
}

/// A plain decimal number with optional sign, fraction and exponent
fn plain_number(input: &str) -> IResult<&str, &str> {
    all_consuming(recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    ))))(input)
}
