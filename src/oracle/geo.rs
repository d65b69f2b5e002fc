use super::{GeoCheck, GeoValidator};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Circular geofence around the office.
#[derive(Debug, Clone, Copy)]
pub struct Geofence {
    pub lat: f64,
    pub lng: f64,
    pub radius_meters: f64,
}

impl Geofence {
    pub fn new(lat: f64, lng: f64, radius_meters: f64) -> Self {
        Self {
            lat,
            lng,
            radius_meters,
        }
    }
}

/// Great-circle distance in meters.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
}

impl GeoValidator for Geofence {
    fn check(&self, lat: f64, lng: f64) -> GeoCheck {
        if !lat.is_finite() || !lng.is_finite() {
            return GeoCheck {
                valid: false,
                distance_meters: f64::INFINITY,
            };
        }
        let distance_meters = haversine_meters(self.lat, self.lng, lat, lng);
        GeoCheck {
            valid: distance_meters <= self.radius_meters,
            distance_meters,
        }
    }
}
