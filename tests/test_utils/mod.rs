#![allow(dead_code)]

use std::{collections::HashMap, sync::Mutex, time::Duration};

use climb_sync::{
    data_types::location::{LatLng, LocationPoint, LocationSequence, ServiceElevation},
    elevation_api::{ElevationService, ServiceError},
};
use tokio::time::Instant;

pub const RESOLUTION: f64 = 4.77;

#[derive(Debug, Clone)]
pub struct Request {
    pub at: Instant,
    pub size: usize,
    pub first: LatLng,
}

/// In-memory elevation service. Elevations come from `elevation_of`, failures
/// are scripted per call number (0-based).
pub struct FakeElevationService {
    elevation_of: fn(LatLng) -> f64,
    latency: Option<Duration>,
    failures: Mutex<HashMap<usize, ServiceError>>,
    requests: Mutex<Vec<Request>>,
}

impl FakeElevationService {
    pub fn new(elevation_of: fn(LatLng) -> f64) -> Self {
        Self {
            elevation_of,
            latency: None,
            failures: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn failing_on(self, call: usize, error: ServiceError) -> Self {
        self.failures.lock().unwrap().insert(call, error);
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

impl ElevationService for FakeElevationService {
    async fn get_elevations(
        &self,
        locations: &[LatLng],
    ) -> Result<Vec<ServiceElevation>, ServiceError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(Request {
                at: Instant::now(),
                size: locations.len(),
                first: locations[0],
            });
            requests.len() - 1
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self.failures.lock().unwrap().remove(&call);
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(locations
            .iter()
            .map(|latlng| ServiceElevation {
                elevation: (self.elevation_of)(*latlng),
                resolution: RESOLUTION,
            })
            .collect())
    }
}

const ORIGIN_LAT: f64 = 45.0;
const STEP: f64 = 1e-4;

/// Track where point `i` sits at latitude `45 + i * 1e-4`.
pub fn track(len: usize) -> LocationSequence {
    LocationSequence::new(
        (0..len)
            .map(|i| {
                LocationPoint::new(
                    format!("2014-05-01T10:{:02}:{:02}Z", i / 60 % 60, i % 60),
                    LatLng::new(ORIGIN_LAT + i as f64 * STEP, 7.6861),
                    200.0,
                )
            })
            .collect(),
    )
}

/// Inverse of [`track`]: the index of the point at `latlng`.
pub fn index_of(latlng: LatLng) -> usize {
    ((latlng.lat - ORIGIN_LAT) / STEP).round() as usize
}

pub fn elevation_from_index(latlng: LatLng) -> f64 {
    index_of(latlng) as f64
}

pub fn assert_waited(waited: Duration, expected: Duration) {
    assert!(
        waited >= expected && waited < expected + Duration::from_millis(50),
        "waited {:?}, expected {:?}",
        waited,
        expected
    );
}
