use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub const INVALID_PAIR: &str = "origin and destination must be valid lat, lng pairs";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A validated latitude/longitude pair that keeps the caller's spelling.
///
/// Built from the `["<lat>", "<lng>"]` shape clients submit. The canonical
/// string form (`"<lat>,<lng>"`) is what gets persisted and sent to the
/// distance provider.
#[derive(Debug, Clone, PartialEq)]
pub struct LatLng {
    lat: String,
    lng: String,
}

impl LatLng {
    pub fn parse(raw: &[String]) -> Result<Self, AppError> {
        let [lat, lng] = raw else {
            return Err(AppError::BadRequest(INVALID_PAIR.to_string()));
        };
        let (lat, lng) = (lat.trim(), lng.trim());

        let point = match (lat.parse::<f64>(), lng.parse::<f64>()) {
            (Ok(lat), Ok(lng)) => GeoPoint { lat, lng },
            _ => return Err(AppError::BadRequest(INVALID_PAIR.to_string())),
        };

        if !in_bounds(&point) {
            return Err(AppError::BadRequest(INVALID_PAIR.to_string()));
        }

        Ok(Self {
            lat: lat.to_string(),
            lng: lng.to_string(),
        })
    }

    pub fn is_valid(raw: &[String]) -> bool {
        Self::parse(raw).is_ok()
    }

    pub fn canonical(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

// NaN fails both comparisons, infinities fail the range.
fn in_bounds(point: &GeoPoint) -> bool {
    (-90.0..=90.0).contains(&point.lat) && (-180.0..=180.0).contains(&point.lng)
}

/// Parses a canonical `"<lat>,<lng>"` string back into a point.
pub fn parse_canonical(raw: &str) -> Option<GeoPoint> {
    let (lat, lng) = raw.split_once(',')?;
    let point = GeoPoint {
        lat: lat.trim().parse().ok()?,
        lng: lng.trim().parse().ok()?,
    };
    in_bounds(&point).then_some(point)
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}
