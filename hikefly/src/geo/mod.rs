//! Great-circle geometry
//!
//! Provides geodesic distance between GPS positions and geographic
//! bounding boxes with conservative distance upper bounds, used by the
//! triangle solver's branch-and-bound pruning.

use std::f64::consts::PI;

/// Mean Earth radius in meters (FAI sphere).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic position in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLon {
    /// Latitude in degrees (-90 to 90).
    pub lat: f64,
    /// Longitude in degrees (-180 to 180).
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance between two positions in meters.
///
/// Uses the haversine formula on the FAI sphere. Planar approximations
/// accumulate systematic error at typical flight path lengths of tens of
/// kilometers; the haversine stays accurate at all the distances a track
/// can contain.
#[inline]
pub fn distance_m(a: LatLon, b: LatLon) -> f64 {
    let lat1 = a.lat * PI / 180.0;
    let lat2 = b.lat * PI / 180.0;
    let dlat = (b.lat - a.lat) * PI / 180.0;
    let dlon = (b.lon - a.lon) * PI / 180.0;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Axis-aligned latitude/longitude bounding box.
///
/// Used by the solver to bound the distance between two index ranges of a
/// track without evaluating every fix pair.
#[derive(Clone, Copy, Debug)]
pub struct GeoBounds {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl GeoBounds {
    /// Computes the bounding box of a non-empty slice of positions.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_points(points: &[LatLon]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lon: first.lon,
            max_lon: first.lon,
        };
        for p in &points[1..] {
            bounds.min_lat = bounds.min_lat.min(p.lat);
            bounds.max_lat = bounds.max_lat.max(p.lat);
            bounds.min_lon = bounds.min_lon.min(p.lon);
            bounds.max_lon = bounds.max_lon.max(p.lon);
        }
        Some(bounds)
    }

    /// Center of the box.
    pub fn center(&self) -> LatLon {
        LatLon {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lon: (self.min_lon + self.max_lon) / 2.0,
        }
    }

    /// Upper bound on the great-circle distance from the center to any
    /// point inside the box, in meters.
    ///
    /// Any point of the box is reachable from the center by a meridian arc
    /// of at most half the latitude span followed by a parallel arc of at
    /// most half the longitude span. The parallel arc is longest at the
    /// box latitude closest to the equator.
    pub fn radius_m(&self) -> f64 {
        let half_lat = (self.max_lat - self.min_lat) / 2.0 * PI / 180.0;
        let half_lon = (self.max_lon - self.min_lon) / 2.0 * PI / 180.0;

        // cos(lat) is maximal at the latitude of smallest magnitude
        let widest_lat = if self.min_lat <= 0.0 && self.max_lat >= 0.0 {
            0.0
        } else {
            self.min_lat.abs().min(self.max_lat.abs())
        };
        let cos_lat = (widest_lat * PI / 180.0).cos();

        EARTH_RADIUS_M * (half_lat + half_lon * cos_lat)
    }

    /// Upper bound on the great-circle distance between any point of this
    /// box and any point of `other`, in meters.
    ///
    /// By the triangle inequality on the sphere the distance between two
    /// contained points cannot exceed the center-to-center distance plus
    /// both bounding radii.
    #[inline]
    pub fn max_distance_m(&self, other: &GeoBounds) -> f64 {
        distance_m(self.center(), other.center()) + self.radius_m() + other.radius_m()
    }
}
