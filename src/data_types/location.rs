use std::ops::Range;

use geo_types::Coord;
use serde_derive::{Deserialize, Serialize};

use crate::processors::elevation_gain::{ClimbCalculator, ElevationGain};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

// Polyline encoding expects x = longitude, y = latitude.
impl From<LatLng> for Coord<f64> {
    fn from(latlng: LatLng) -> Self {
        Coord {
            x: latlng.lng,
            y: latlng.lat,
        }
    }
}

/// Elevation as reported by the elevation service for a single location.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ServiceElevation {
    pub elevation: f64,
    /// Maximum distance in meters between the data points the elevation was interpolated from.
    pub resolution: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LocationPoint {
    pub timestamp: String,
    pub coordinates: LatLng,
    pub recorded_elevation: f64,

    #[serde(default)]
    service_elevation: Option<ServiceElevation>,
}

impl LocationPoint {
    pub fn new(timestamp: impl Into<String>, coordinates: LatLng, recorded_elevation: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            coordinates,
            recorded_elevation,
            service_elevation: None,
        }
    }

    pub fn service_elevation(&self) -> Option<&ServiceElevation> {
        self.service_elevation.as_ref()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElevationSource {
    /// Elevation written in the track file.
    Recorded,
    /// Elevation fetched from the elevation service.
    Service,
}

impl ElevationSource {
    pub fn elevation_of(self, point: &LocationPoint) -> Option<f64> {
        match self {
            ElevationSource::Recorded => Some(point.recorded_elevation),
            ElevationSource::Service => point.service_elevation.map(|e| e.elevation),
        }
    }
}

/// Ordered track points of one loaded file.
///
/// The length is fixed at construction. The only mutation allowed afterwards is
/// [`LocationSequence::merge_service_elevations`], which enriches existing points
/// in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationSequence {
    points: Vec<LocationPoint>,
}

impl LocationSequence {
    pub fn new(points: Vec<LocationPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[LocationPoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&LocationPoint> {
        self.points.get(index)
    }

    pub fn coordinates(&self, range: Range<usize>) -> Vec<LatLng> {
        let end = range.end.min(self.points.len());
        let start = range.start.min(end);

        self.points[start..end]
            .iter()
            .map(|point| point.coordinates)
            .collect()
    }

    /// Writes `elevations` onto the points starting at `cursor`, by position.
    ///
    /// Points that already carry a service elevation keep it. Returns the number of
    /// points that were enriched.
    pub fn merge_service_elevations(
        &mut self,
        cursor: usize,
        elevations: &[ServiceElevation],
    ) -> usize {
        let mut merged = 0;

        for (point, elevation) in self.points.iter_mut().skip(cursor).zip(elevations) {
            if point.service_elevation.is_none() {
                point.service_elevation = Some(*elevation);
                merged += 1;
            }
        }

        merged
    }

    pub fn enriched_count(&self) -> usize {
        self.points
            .iter()
            .filter(|point| point.service_elevation.is_some())
            .count()
    }

    pub fn is_fully_enriched(&self) -> bool {
        self.points
            .iter()
            .all(|point| point.service_elevation.is_some())
    }

    /// Total climb using `source`, or `None` when a service elevation is still missing.
    pub fn climb(&self, source: ElevationSource, noise_threshold: f64) -> Option<ElevationGain> {
        if source == ElevationSource::Service && !self.is_fully_enriched() {
            return None;
        }

        let calculator = ClimbCalculator::new(noise_threshold);

        Some(calculator.compute(&self.points, |point| {
            source.elevation_of(point).unwrap_or(point.recorded_elevation)
        }))
    }
}
