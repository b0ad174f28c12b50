use chrono::{DateTime, Utc};
use serde_derive::Serialize;

use super::location::LocationSequence;
use crate::{
    processors::elevation_gain::{ClimbCalculator, NoisyStep},
    util::DateTimeUtils,
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChartSample {
    pub timestamp: String,
    /// `None` when the timestamp is not RFC 3339.
    pub time: Option<DateTime<Utc>>,
    pub recorded_elevation: f64,
    pub service_elevation: Option<f64>,
    pub recorded_climb: f64,
    /// Climb from the first point up to here, `None` once a point is not yet enriched.
    pub service_climb: Option<f64>,
}

/// Elevation and cumulative climb over time, one sample per track point.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub samples: Vec<ChartSample>,
    pub recorded_noise: Vec<NoisyStep>,
    /// Only covers the points up to the first one without a service elevation.
    pub service_noise: Vec<NoisyStep>,
}

impl ChartSeries {
    pub fn from_sequence(locations: &LocationSequence, noise_threshold: f64) -> Self {
        let calculator = ClimbCalculator::new(noise_threshold);
        let points = locations.points();

        let (recorded_climb, recorded_gain) =
            calculator.cumulative(points, |point| Some(point.recorded_elevation));
        let (service_climb, service_gain) = calculator.cumulative(points, |point| {
            point.service_elevation().map(|e| e.elevation)
        });

        let samples = points
            .iter()
            .enumerate()
            .map(|(index, point)| ChartSample {
                timestamp: point.timestamp.clone(),
                time: DateTimeUtils::parse_timestamp(&point.timestamp),
                recorded_elevation: point.recorded_elevation,
                service_elevation: point.service_elevation().map(|e| e.elevation),
                recorded_climb: recorded_climb[index],
                service_climb: service_climb.get(index).copied(),
            })
            .collect();

        Self {
            samples,
            recorded_noise: recorded_gain.noisy_steps,
            service_noise: service_gain.noisy_steps,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::location::{LatLng, LocationPoint, ServiceElevation};

    fn seq(recorded: &[f64]) -> LocationSequence {
        LocationSequence::new(
            recorded
                .iter()
                .enumerate()
                .map(|(i, ele)| {
                    LocationPoint::new(
                        format!("2014-05-01T10:00:{:02}Z", i),
                        LatLng::new(45.0, 7.0),
                        *ele,
                    )
                })
                .collect(),
        )
    }

    fn service(values: &[f64]) -> Vec<ServiceElevation> {
        values
            .iter()
            .map(|v| ServiceElevation {
                elevation: *v,
                resolution: 1.0,
            })
            .collect()
    }

    #[test]
    fn cumulative_climb_per_sample() {
        let mut locations = seq(&[100., 105., 103., 120., 118.]);
        locations.merge_service_elevations(0, &service(&[100., 90., 130., 130., 140.]));

        let chart = ChartSeries::from_sequence(&locations, 10.0);
        let recorded: Vec<f64> = chart.samples.iter().map(|s| s.recorded_climb).collect();
        let service: Vec<Option<f64>> = chart.samples.iter().map(|s| s.service_climb).collect();

        assert_eq!(recorded, vec![0., 5., 5., 22., 22.]);
        assert_eq!(
            service,
            vec![Some(0.), Some(0.), Some(40.), Some(40.), Some(50.)]
        );
        assert!(chart.samples[0].time.is_some());

        // +17 on the file track, +40 on the service track
        assert_eq!(chart.recorded_noise, vec![NoisyStep { index: 3, delta: 17.0 }]);
        assert_eq!(chart.service_noise, vec![NoisyStep { index: 2, delta: 40.0 }]);
    }

    #[test]
    fn service_climb_stops_at_first_gap() {
        let mut locations = seq(&[1., 2., 3.]);
        locations.merge_service_elevations(0, &service(&[10., 20.]));

        let chart = ChartSeries::from_sequence(&locations, 10.0);

        assert_eq!(chart.samples[1].service_climb, Some(10.));
        assert_eq!(chart.samples[2].service_climb, None);
        assert!(chart.to_json().unwrap().contains("\"recorded_climb\": 2.0"));
    }
}
