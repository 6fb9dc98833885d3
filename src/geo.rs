//! Great-circle distance and radius search.

use crate::report::Office;
use serde::Serialize;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Anything with a latitude/longitude in decimal degrees.
pub trait Located {
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;
}

impl Located for Office {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// An entity annotated with its distance from a reference point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithDistance<T> {
    #[serde(flatten)]
    pub entity: T,
    pub distance_km: f64,
}

/// Haversine distance in kilometers.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let half_chord = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // rounding can push near-antipodal pairs just past 1.0
    let half_chord = half_chord.clamp(0.0, 1.0);
    let angle = 2.0 * half_chord.sqrt().atan2((1.0 - half_chord).sqrt());
    EARTH_RADIUS_KM * angle
}

/// Entities within `radius_km` of the reference point, nearest first.
///
/// Equidistant entities keep their input order.
pub fn find_within_radius<T, I>(
    ref_lat: f64,
    ref_lon: f64,
    entities: I,
    radius_km: f64,
) -> Vec<WithDistance<T>>
where
    T: Located,
    I: IntoIterator<Item = T>,
{
    let mut nearby: Vec<WithDistance<T>> = entities
        .into_iter()
        .map(|entity| {
            let distance_km = distance_km(ref_lat, ref_lon, entity.latitude(), entity.longitude());
            WithDistance {
                entity,
                distance_km,
            }
        })
        .filter(|candidate| candidate.distance_km <= radius_km)
        .collect();
    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby
}
