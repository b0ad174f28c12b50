use serde_derive::Serialize;

use crate::{data_types::location::LocationPoint, logvbln};

/// Default step size above which a single rise is reported as likely noise.
pub const DEFAULT_NOISE_THRESHOLD: f64 = 10.0; // meters

/// A single rise between `index - 1` and `index` larger than the noise threshold.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct NoisyStep {
    pub index: usize,
    pub delta: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElevationGain {
    pub total: f64,
    /// Steps flagged as likely noise. They are still part of `total`.
    pub noisy_steps: Vec<NoisyStep>,
}

pub struct ClimbCalculator {
    noise_threshold: f64,
}

impl Default for ClimbCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_NOISE_THRESHOLD)
    }
}

impl ClimbCalculator {
    const CC: &'static str = "Climb";

    pub fn new(noise_threshold: f64) -> Self {
        Self { noise_threshold }
    }

    /// Sums every positive elevation difference between consecutive points.
    pub fn compute<F>(&self, points: &[LocationPoint], elevation_of: F) -> ElevationGain
    where
        F: Fn(&LocationPoint) -> f64,
    {
        self.cumulative(points, |point| Some(elevation_of(point))).1
    }

    /// Climb from the first point up to each point, in order.
    ///
    /// The walk stops at the first point `elevation_of` has no value for, so the
    /// running totals may be shorter than `points`.
    pub fn cumulative<F>(&self, points: &[LocationPoint], elevation_of: F) -> (Vec<f64>, ElevationGain)
    where
        F: Fn(&LocationPoint) -> Option<f64>,
    {
        let mut gain = ElevationGain::default();
        let mut totals: Vec<f64> = Vec::with_capacity(points.len());
        let mut previous: Option<f64> = None;

        for (index, point) in points.iter().enumerate() {
            let Some(elevation) = elevation_of(point) else {
                break;
            };

            if let Some(previous) = previous {
                let delta = elevation - previous;

                if delta > 0. {
                    if delta > self.noise_threshold {
                        logvbln!(
                            "Likely noise at point {} ({}): +{:.1}m",
                            index,
                            point.timestamp,
                            delta
                        );

                        gain.noisy_steps.push(NoisyStep { index, delta });
                    }

                    gain.total += delta;
                }
            }

            totals.push(gain.total);
            previous = Some(elevation);
        }

        (totals, gain)
    }
}

/// Total climb over `points` with the default noise threshold.
pub fn compute_elevation_gain<F>(points: &[LocationPoint], elevation_of: F) -> f64
where
    F: Fn(&LocationPoint) -> f64,
{
    ClimbCalculator::default().compute(points, elevation_of).total
}
