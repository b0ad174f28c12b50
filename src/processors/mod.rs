pub mod elevation_gain;
pub mod elevation_sync;
