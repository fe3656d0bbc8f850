use std::fmt;

use crate::geo_point::{GeoPoint, Path};

const PRECISION: f64 = 1e5;
const MAX_LATITUDE: i64 = 90 * 100_000;
const MAX_LONGITUDE: i64 = 180 * 100_000;

#[derive(Debug, Clone, PartialEq)]
pub enum PolylineError {
    InvalidCharacter { index: usize },
    Truncated,
    OutOfRange { index: usize },
}

impl fmt::Display for PolylineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolylineError::InvalidCharacter { index } => write!(f, "invalid polyline character at {index}"),
            PolylineError::Truncated => write!(f, "polyline ended in the middle of a value"),
            PolylineError::OutOfRange { index } => write!(f, "polyline coordinate out of range before {index}"),
        }
    }
}

impl std::error::Error for PolylineError {}

/// Decodes an encoded polyline with 5 digit precision.
pub fn decode_polyline(encoded: &str) -> Result<Path, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut latitude: i64 = 0;
    let mut longitude: i64 = 0;
    let mut path = Vec::new();

    while index < bytes.len() {
        latitude = accumulate(latitude, next_delta(bytes, &mut index)?, MAX_LATITUDE, index)?;
        if index >= bytes.len() {
            return Err(PolylineError::Truncated);
        }
        longitude = accumulate(longitude, next_delta(bytes, &mut index)?, MAX_LONGITUDE, index)?;

        path.push(GeoPoint::new(latitude as f64 / PRECISION, longitude as f64 / PRECISION));
    }

    Ok(path)
}

fn accumulate(total: i64, delta: i64, limit: i64, index: usize) -> Result<i64, PolylineError> {
    total
        .checked_add(delta)
        .filter(|value| value.abs() <= limit)
        .ok_or(PolylineError::OutOfRange { index })
}

fn next_delta(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(PolylineError::Truncated);
        };
        if !(63..=126).contains(&byte) || shift > 60 {
            return Err(PolylineError::InvalidCharacter { index: *index });
        }
        *index += 1;

        let chunk = (byte - 63) as i64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    if result & 1 == 1 {
        Ok(!(result >> 1))
    } else {
        Ok(result >> 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(point: GeoPoint, latitude: f64, longitude: f64) {
        assert!((point.latitude - latitude).abs() < 1e-9, "{point:?}");
        assert!((point.longitude - longitude).abs() < 1e-9, "{point:?}");
    }

    #[test]
    fn decodes_reference_polyline() {
        let path = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_eq!(path.len(), 3);
        assert_close(path[0], 38.5, -120.2);
        assert_close(path[1], 40.7, -120.95);
        assert_close(path[2], 43.252, -126.453);
    }

    #[test]
    fn empty_polyline_is_empty_path() {
        assert_eq!(decode_polyline("").unwrap(), Vec::new());
    }

    #[test]
    fn rejects_truncated_input() {
        // Latitude without longitude
        assert_eq!(decode_polyline("_p~iF"), Err(PolylineError::Truncated));
        // Continuation bit set on the last character
        assert_eq!(decode_polyline("_p~iF~ps|"), Err(PolylineError::Truncated));
    }

    #[test]
    fn rejects_out_of_range_characters() {
        assert_eq!(decode_polyline("_p~iF ps|U"), Err(PolylineError::InvalidCharacter { index: 5 }));
    }

    #[test]
    fn rejects_coordinates_outside_the_globe() {
        let garbage = "~~~~~~~~~~~~B".repeat(10);
        assert!(matches!(decode_polyline(&garbage), Err(PolylineError::OutOfRange { .. })));

        // 91 degrees latitude
        assert_eq!(decode_polyline("_mljP?"), Err(PolylineError::OutOfRange { index: 5 }));
    }
}
