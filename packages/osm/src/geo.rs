//! Geographic primitives: coordinates and axis-aligned extents.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Loc {
    pub lon: f64,
    pub lat: f64,
}

impl Loc {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Linear interpolation, `t = 0` gives `a` and `t = 1` gives `b`
    pub fn interp(a: Loc, b: Loc, t: f64) -> Loc {
        Loc {
            lon: a.lon + (b.lon - a.lon) * t,
            lat: a.lat + (b.lat - a.lat) * t,
        }
    }

    /// True if the two coordinates differ by more than `epsilon` on either axis
    pub fn differs_from(&self, other: &Loc, epsilon: f64) -> bool {
        (self.lon - other.lon).abs() > epsilon || (self.lat - other.lat).abs() > epsilon
    }

    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<[f64; 2]> for Loc {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Loc::new(lon, lat)
    }
}

/// Axis-aligned rectangle in lon/lat space
///
/// An extent may be empty (`min > max`), which is what a way with no loaded
/// nodes produces. Empty extents intersect nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: Loc,
    pub max: Loc,
}

impl Extent {
    pub const EMPTY: Extent = Extent {
        min: Loc::new(f64::INFINITY, f64::INFINITY),
        max: Loc::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
    };

    pub fn new(a: impl Into<Loc>, b: impl Into<Loc>) -> Self {
        let (a, b) = (a.into(), b.into());
        Self {
            min: Loc::new(a.lon.min(b.lon), a.lat.min(b.lat)),
            max: Loc::new(a.lon.max(b.lon), a.lat.max(b.lat)),
        }
    }

    pub fn from_point(loc: Loc) -> Self {
        Self { min: loc, max: loc }
    }

    pub fn is_empty(&self) -> bool {
        self.min.lon > self.max.lon || self.min.lat > self.max.lat
    }

    pub fn extend_point(&mut self, loc: Loc) {
        self.min.lon = self.min.lon.min(loc.lon);
        self.min.lat = self.min.lat.min(loc.lat);
        self.max.lon = self.max.lon.max(loc.lon);
        self.max.lat = self.max.lat.max(loc.lat);
    }

    pub fn extend(&mut self, other: &Extent) {
        if other.is_empty() {
            return;
        }
        self.extend_point(other.min);
        self.extend_point(other.max);
    }

    pub fn union(mut self, other: &Extent) -> Extent {
        self.extend(other);
        self
    }

    /// Closed-interval overlap test
    pub fn intersects(&self, other: &Extent) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min.lon <= other.max.lon
            && other.min.lon <= self.max.lon
            && self.min.lat <= other.max.lat
            && other.min.lat <= self.max.lat
    }

    pub fn contains(&self, loc: Loc) -> bool {
        !self.is_empty()
            && loc.lon >= self.min.lon
            && loc.lon <= self.max.lon
            && loc.lat >= self.min.lat
            && loc.lat <= self.max.lat
    }

    pub fn center(&self) -> Option<Loc> {
        (!self.is_empty()).then(|| Loc::interp(self.min, self.max, 0.5))
    }
}

impl Default for Extent {
    fn default() -> Self {
        Extent::EMPTY
    }
}
