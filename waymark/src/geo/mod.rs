//! Geographic math: distances, geofence containment and map regions.
//!
//! Two distance functions are provided:
//!
//! - [`haversine_distance_m`] - great-circle distance; used for geofence
//!   radius tests and movement speed.
//! - [`approx_distance_m`] - planar degree distance scaled by 111 km/degree;
//!   only suitable for short-range "did it jump far enough" filtering.

mod types;

pub use types::{Coordinate, Place, Region, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree used by the planar approximation.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Fallback region center used when there is nothing to frame (San Francisco).
pub const DEFAULT_REGION_CENTER: Coordinate = Coordinate::new(37.78825, -122.4324);

/// Fallback latitude span in degrees.
pub const DEFAULT_LATITUDE_DELTA: f64 = 0.0922;

/// Fallback longitude span in degrees.
pub const DEFAULT_LONGITUDE_DELTA: f64 = 0.0421;

/// Default padding added around a bounding box, in degrees.
pub const DEFAULT_REGION_PADDING: f64 = 0.1;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Great-circle distance between two points in meters (haversine formula).
///
/// # Example
///
/// ```
/// use waymark::geo::haversine_distance_m;
///
/// // One degree of latitude is roughly 111.2 km
/// let d = haversine_distance_m(0.0, 0.0, 1.0, 0.0);
/// assert!((d - 111_195.0).abs() < 1.0);
/// ```
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1 * DEG_TO_RAD;
    let phi2 = lat2 * DEG_TO_RAD;
    let delta_phi = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lambda = (lon2 - lon1) * DEG_TO_RAD;

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Haversine distance between two coordinates in meters.
#[inline]
pub fn distance_between(from: Coordinate, to: Coordinate) -> f64 {
    haversine_distance_m(from.latitude, from.longitude, to.latitude, to.longitude)
}

/// Planar approximation of the distance between two points in meters.
///
/// Treats degrees of latitude and longitude as equal length, which
/// overestimates east-west distances away from the equator. Good enough for
/// deciding whether a sample moved tens of meters; wrong for geofences.
pub fn approx_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;
    (d_lat * d_lat + d_lon * d_lon).sqrt() * METERS_PER_DEGREE
}

/// Returns true if `point` lies inside `place` (boundary inclusive).
pub fn is_within_radius(point: Coordinate, place: &Place) -> bool {
    distance_between(point, place.center()) <= place.radius
}

/// Computes a region that frames all `points` with `padding` degrees of slack.
///
/// An empty slice yields the fixed fallback region. A zero span on either
/// axis (single point, or points on a line) falls back to the default delta
/// for that axis.
pub fn bounding_region(points: &[Coordinate], padding: f64) -> Region {
    let Some(first) = points.first() else {
        return Region {
            center: DEFAULT_REGION_CENTER,
            latitude_delta: DEFAULT_LATITUDE_DELTA,
            longitude_delta: DEFAULT_LONGITUDE_DELTA,
        };
    };

    let (mut min_lat, mut max_lat) = (first.latitude, first.latitude);
    let (mut min_lon, mut max_lon) = (first.longitude, first.longitude);

    for point in &points[1..] {
        min_lat = min_lat.min(point.latitude);
        max_lat = max_lat.max(point.latitude);
        min_lon = min_lon.min(point.longitude);
        max_lon = max_lon.max(point.longitude);
    }

    let latitude_delta = non_zero_or(max_lat - min_lat + padding, DEFAULT_LATITUDE_DELTA);
    let longitude_delta = non_zero_or(max_lon - min_lon + padding, DEFAULT_LONGITUDE_DELTA);

    Region {
        center: Coordinate::new((max_lat + min_lat) / 2.0, (max_lon + min_lon) / 2.0),
        latitude_delta,
        longitude_delta,
    }
}

fn non_zero_or(value: f64, fallback: f64) -> f64 {
    if value == 0.0 {
        fallback
    } else {
        value
    }
}

/// Formats a distance for display: `"850m"` below a kilometer, `"1.2km"` above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}
