use std::{
    fmt,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use ::gpx::{read, Waypoint};

use crate::data_types::location::{LatLng, LocationPoint, LocationSequence};

#[derive(Debug, Clone, PartialEq)]
pub enum GpxError {
    MalformedSource(String),
    /// The track point has no `<time>`. Some exporters strip timing data on purpose.
    MissingTimestamp { index: usize },
    MissingElevation { index: usize },
    NoTrackPoints,
}

impl fmt::Display for GpxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpxError::MalformedSource(msg) => write!(f, "Malformed GPX: {}", msg),
            GpxError::MissingTimestamp { index } => write!(
                f,
                "Track point {} has no timestamp. The data source did not export timing data; \
                 export the track again with timestamps included",
                index
            ),
            GpxError::MissingElevation { index } => {
                write!(f, "Track point {} has no elevation", index)
            }
            GpxError::NoTrackPoints => write!(f, "No track points found"),
        }
    }
}

impl std::error::Error for GpxError {}

fn to_location_point(index: usize, point: &Waypoint) -> Result<LocationPoint, GpxError> {
    let timestamp = match &point.time {
        Some(time) => time
            .format()
            .map_err(|e| GpxError::MalformedSource(e.to_string()))?,
        None => return Err(GpxError::MissingTimestamp { index }),
    };

    let recorded_elevation = point
        .elevation
        .ok_or(GpxError::MissingElevation { index })?;

    let position = point.point();

    Ok(LocationPoint::new(
        timestamp,
        LatLng::new(position.y(), position.x()),
        recorded_elevation,
    ))
}

fn read_track<R: Read>(reader: R) -> Result<LocationSequence, GpxError> {
    let gpx_data = read(reader).map_err(|e| GpxError::MalformedSource(e.to_string()))?;

    // Segments are concatenated, points keep document order
    let points = gpx_data
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .enumerate()
        .map(|(index, point)| to_location_point(index, point))
        .collect::<Result<Vec<LocationPoint>, GpxError>>()?;

    if points.is_empty() {
        return Err(GpxError::NoTrackPoints);
    }

    Ok(LocationSequence::new(points))
}

/// Reads every track point of a GPX document, in document order.
pub fn parse_gpx(xml: &str) -> Result<LocationSequence, GpxError> {
    read_track(xml.as_bytes())
}

pub fn load_gpx_file(path: &Path) -> crate::error::Result<LocationSequence> {
    let file = File::open(path)?;

    Ok(read_track(BufReader::new(file))?)
}
