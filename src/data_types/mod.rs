pub mod chart;
pub mod location;
