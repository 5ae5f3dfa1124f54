//! Maidenhead-style grid locators
//!
//! A [`GridLocator`] names a geographic cell with four characters in the
//! form `[A-R][A-R][0-9][0-9]` (e.g. `FN31`). Stations announce extended
//! six-character locators occasionally; only the first four characters are
//! kept since that is the resolution the map works at.
//!
//! Conversion both ways is pure arithmetic: each cell is 2 degrees of
//! longitude by 1 degree of latitude, and the returned coordinate is the
//! cell center-ish point `(letters*10 + digits)*2 - 179` / `- 90`.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// Sentinel coordinate returned by [`grid_to_coordinate`] for malformed
/// locators, pointing at nothing in particular in the North Atlantic.
pub const UNKNOWN_COORDINATE: (f64, f64) = (-90.0, 40.0);

/// Validated 4-character grid locator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridLocator(String);

impl GridLocator {
    /// Parse a grid locator, truncating extended locators to 4 characters
    ///
    /// A bad value can turn up if somebody sent a message like
    /// `CALL1: CALL2 GRID IS DOWN`, so anything not matching
    /// `[A-R][A-R][0-9][0-9]` is rejected.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let cleaned = raw.trim().to_ascii_uppercase();
        // A multi-byte character straddling the cut would make the slice
        // below panic; such input can never be a valid locator anyway.
        if cleaned.len() < 4 || !cleaned.is_char_boundary(4) {
            return Err(CoreError::InvalidGrid(raw.to_string()));
        }

        let short = &cleaned[..4];
        let bytes = short.as_bytes();
        let field_ok = |b: u8| (b'A'..=b'R').contains(&b);
        if !(field_ok(bytes[0])
            && field_ok(bytes[1])
            && bytes[2].is_ascii_digit()
            && bytes[3].is_ascii_digit())
        {
            return Err(CoreError::InvalidGrid(raw.to_string()));
        }

        Ok(Self(short.to_string()))
    }

    /// Convert to a `(longitude, latitude)` pair in degrees
    pub fn coordinate(&self) -> (f64, f64) {
        let b = self.0.as_bytes();
        let longitude = (((b[0] - b'A') as f64) * 10.0 + ((b[2] - b'0') as f64)) * 2.0 - 179.0;
        let latitude = ((b[1] - b'A') as f64) * 10.0 + ((b[3] - b'0') as f64) - 90.0;
        (longitude, latitude)
    }

    /// Convert a `(longitude, latitude)` pair to the grid cell containing it
    ///
    /// Longitude must be in `[-180, 180)` and latitude in `[-90, 90)`.
    pub fn from_coordinate(longitude: f64, latitude: f64) -> CoreResult<Self> {
        if !(-180.0..180.0).contains(&longitude) || !(-90.0..90.0).contains(&latitude) {
            return Err(CoreError::CoordinateOutOfRange {
                longitude,
                latitude,
            });
        }

        // Shift origins and count whole cells in integers so that cell
        // boundaries land exactly. Longitude cells are 2 degrees wide,
        // latitude cells 1 degree tall; fields cover 10 cells each.
        let lng_cells = ((longitude + 180.0) / 2.0).floor() as u32;
        let lat_cells = (latitude + 90.0).floor() as u32;

        let chars = [
            b'A' + (lng_cells / 10) as u8,
            b'A' + (lat_cells / 10) as u8,
            b'0' + (lng_cells % 10) as u8,
            b'0' + (lat_cells % 10) as u8,
        ];
        // Always valid UTF-8 given the bounds check above.
        Ok(Self(String::from_utf8_lossy(&chars).into_owned()))
    }

    /// Get the locator as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GridLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Total conversion from raw locator text to a coordinate pair
///
/// The rendering boundary wants a coordinate for whatever text it has.
/// Malformed input logs a warning and yields [`UNKNOWN_COORDINATE`]
/// instead of failing.
pub fn grid_to_coordinate(raw: &str) -> (f64, f64) {
    match GridLocator::parse(raw) {
        Ok(grid) => grid.coordinate(),
        Err(_) => {
            warn!(grid = raw, "bad grid locator, using unknown coordinate");
            UNKNOWN_COORDINATE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(GridLocator::parse("FN31").unwrap().as_str(), "FN31");
        assert_eq!(GridLocator::parse("aa00").unwrap().as_str(), "AA00");
        assert_eq!(GridLocator::parse("RR99").unwrap().as_str(), "RR99");
    }

    #[test]
    fn test_parse_truncates_extended() {
        assert_eq!(GridLocator::parse("FN31pr").unwrap().as_str(), "FN31");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(GridLocator::parse("").is_err());
        assert!(GridLocator::parse("FN3").is_err());
        assert!(GridLocator::parse("ZZ99").is_err());
        assert!(GridLocator::parse("F3N1").is_err());
        assert!(GridLocator::parse("DOWN").is_err());
    }

    #[test]
    fn test_parse_rejects_multibyte_text() {
        // Garbled decodes can carry arbitrary UTF-8; a character
        // straddling the 4-byte cut must reject, not panic.
        assert!(GridLocator::parse("000\u{e9}").is_err());
        assert!(GridLocator::parse("FN\u{e9}1pr").is_err());
        assert_eq!(grid_to_coordinate("000\u{e9}"), UNKNOWN_COORDINATE);
    }

    #[test]
    fn test_known_coordinate() {
        // W1AW's neighborhood
        let (lon, lat) = GridLocator::parse("FN31").unwrap().coordinate();
        assert_eq!(lon, -73.0);
        assert_eq!(lat, 41.0);
    }

    #[test]
    fn test_round_trip_all_locators() {
        // Total and deterministic: every valid locator survives the
        // inverse conversion.
        for f1 in b'A'..=b'R' {
            for f2 in b'A'..=b'R' {
                for d1 in b'0'..=b'9' {
                    for d2 in b'0'..=b'9' {
                        let s = String::from_utf8(vec![f1, f2, d1, d2]).unwrap();
                        let grid = GridLocator::parse(&s).unwrap();
                        let (lon, lat) = grid.coordinate();
                        let back = GridLocator::from_coordinate(lon, lat).unwrap();
                        assert_eq!(grid, back, "round trip failed for {s}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_sentinel_for_bad_input() {
        assert_eq!(grid_to_coordinate("??"), UNKNOWN_COORDINATE);
        assert_eq!(grid_to_coordinate(""), UNKNOWN_COORDINATE);
    }

    #[test]
    fn test_from_coordinate_bounds() {
        assert!(GridLocator::from_coordinate(180.0, 0.0).is_err());
        assert!(GridLocator::from_coordinate(0.0, 90.0).is_err());
        assert!(GridLocator::from_coordinate(-180.0, -90.0).is_ok());
    }
}
