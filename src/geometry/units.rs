//! Length units for application meshes.
//!
//! A length unit states how much physical distance one mesh unit represents,
//! e.g. `"1 cm"`, `"5inches"` or `"1*m"`. The reference frame is in metres.

use crate::coupling_error::CouplingError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metres per unit, keyed by every accepted spelling.
const UNITS: &[(&[&str], f64)] = &[
    (&["m", "meter", "meters", "metre", "metres"], 1.0),
    (&["km", "kilometer", "kilometers"], 1.0e3),
    (&["cm", "centimeter", "centimeters"], 1.0e-2),
    (&["mm", "millimeter", "millimeters"], 1.0e-3),
    (&["um", "micrometer", "micrometers", "micron", "microns"], 1.0e-6),
    (&["nm", "nanometer", "nanometers"], 1.0e-9),
    (&["in", "inch", "inches"], 0.0254),
    (&["ft", "foot", "feet"], 0.3048),
    (&["mi", "mile", "miles"], 1609.344),
];

/// A parsed length unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LengthUnit {
    text: String,
    metres: f64,
}

impl Default for LengthUnit {
    fn default() -> Self {
        Self {
            text: "1*m".into(),
            metres: 1.0,
        }
    }
}

impl LengthUnit {
    /// Parse `"<value>[ *]<unit>"`; the value defaults to 1.
    pub fn parse(text: &str) -> Result<Self, CouplingError> {
        let trimmed = text.trim();
        let split = trimmed
            .char_indices()
            .rev()
            .find(|(_, c)| !c.is_ascii_alphabetic())
            .map_or(0, |(i, c)| i + c.len_utf8());
        let (value, unit) = trimmed.split_at(split);
        let value = value.trim().trim_end_matches('*').trim();
        let value = if value.is_empty() {
            1.0
        } else {
            value
                .parse::<f64>()
                .map_err(|_| CouplingError::InvalidLengthUnit(text.into()))?
        };
        let unit = unit.trim().to_ascii_lowercase();
        let per_unit = UNITS
            .iter()
            .find(|(names, _)| names.contains(&unit.as_str()))
            .map(|(_, m)| *m)
            .ok_or_else(|| CouplingError::InvalidLengthUnit(text.into()))?;
        let metres = value * per_unit;
        if !(metres.is_finite() && metres > 0.0) {
            return Err(CouplingError::InvalidLengthUnit(text.into()));
        }
        Ok(Self {
            text: trimmed.to_string(),
            metres,
        })
    }

    /// A unit of exactly `metres` metres.
    pub fn from_metres(metres: f64) -> Result<Self, CouplingError> {
        Self::parse(&format!("{metres}*m"))
    }

    /// Metres represented by one mesh unit.
    #[inline]
    pub fn metres(&self) -> f64 {
        self.metres
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_spellings() {
        assert_eq!(LengthUnit::parse("1 cm").unwrap().metres(), 0.01);
        assert_eq!(LengthUnit::parse("1*m").unwrap().metres(), 1.0);
        assert!((LengthUnit::parse("5inches").unwrap().metres() - 0.127).abs() < 1e-12);
        assert_eq!(LengthUnit::parse("mm").unwrap().metres(), 1e-3);
        assert!((LengthUnit::parse("2 ft").unwrap().metres() - 0.6096).abs() < 1e-12);
        assert!((LengthUnit::parse("1e-3 m").unwrap().metres() - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn rejects_garbage() {
        assert!(LengthUnit::parse("12").is_err());
        assert!(LengthUnit::parse("1 parsec").is_err());
        assert!(LengthUnit::parse("-1 m").is_err());
        assert!(LengthUnit::parse("0 m").is_err());
    }

    #[test]
    fn from_metres_matches_parse() {
        let unit = LengthUnit::from_metres(0.25).unwrap();
        assert_eq!(unit.metres(), 0.25);
    }
}
