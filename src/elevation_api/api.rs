use std::time::Duration;

use curl::easy::Easy;
use geo_types::Coord;
use serde_derive::Deserialize;

use super::{ElevationService, ServiceError};
use crate::{
    data_types::location::{LatLng, ServiceElevation},
    logvbln,
};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/elevation/json";

const POLYLINE_PRECISION: u32 = 5;

#[derive(Deserialize, Debug)]
struct ElevationResponse {
    status: String,

    #[serde(default)]
    results: Vec<ElevationResult>,

    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ElevationResult {
    elevation: f64,

    #[serde(default)]
    resolution: f64,
}

/// Client for the Google Maps Elevation web service.
pub struct ElevationApi {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl ElevationApi {
    const CC: &'static str = "ElevationApi";

    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            timeout,
        }
    }

    // Locations go out as an encoded polyline so a full page fits in the URL.
    fn locations_param(locations: &[LatLng]) -> Result<String, ServiceError> {
        polyline::encode_coordinates(
            locations.iter().map(|latlng| Coord::<f64>::from(*latlng)),
            POLYLINE_PRECISION,
        )
        .map(|encoded| format!("enc:{}", encoded))
        .map_err(|e| ServiceError::Decode(format!("cannot encode locations: {}", e)))
    }

    fn get_request(
        base_url: &str,
        api_key: &str,
        locations: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, ServiceError> {
        let mut handle = Easy::new();

        let url = format!(
            "{}?locations={}&key={}",
            base_url,
            handle.url_encode(locations.as_bytes()),
            handle.url_encode(api_key.as_bytes())
        );

        let map_curl_err = |e: curl::Error| {
            if e.is_operation_timedout() {
                ServiceError::Timeout(timeout)
            } else {
                ServiceError::Transport(e.to_string())
            }
        };

        handle.get(true).map_err(map_curl_err)?;
        handle.url(&url).map_err(map_curl_err)?;
        handle.timeout(timeout).map_err(map_curl_err)?;

        let mut buffer_response = Vec::new();
        {
            let mut transfer = handle.transfer();

            transfer
                .write_function(|data| {
                    buffer_response.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(map_curl_err)?;

            transfer.perform().map_err(map_curl_err)?;
        }

        Ok(buffer_response)
    }

    /// Turns a raw response body into one elevation per requested location.
    pub fn parse_response(
        body: &[u8],
        expected: usize,
    ) -> Result<Vec<ServiceElevation>, ServiceError> {
        let response: ElevationResponse =
            serde_json::from_slice(body).map_err(|e| ServiceError::Decode(e.to_string()))?;

        if response.status != "OK" {
            if let Some(message) = &response.error_message {
                return Err(match ServiceError::from_status(&response.status) {
                    ServiceError::UnrecognizedStatus(status) => {
                        ServiceError::UnrecognizedStatus(format!("{}: {}", status, message))
                    }
                    known => known,
                });
            }

            return Err(ServiceError::from_status(&response.status));
        }

        if response.results.len() != expected {
            return Err(ServiceError::ResultCountMismatch {
                expected,
                got: response.results.len(),
            });
        }

        Ok(response
            .results
            .into_iter()
            .map(|result| ServiceElevation {
                elevation: result.elevation,
                resolution: result.resolution,
            })
            .collect())
    }
}

impl ElevationService for ElevationApi {
    async fn get_elevations(
        &self,
        locations: &[LatLng],
    ) -> Result<Vec<ServiceElevation>, ServiceError> {
        let expected = locations.len();
        let locations_param = ElevationApi::locations_param(locations)?;

        logvbln!("Requesting {} elevations", expected);

        let base_url = self.base_url.clone();
        let api_key = self.api_key.clone();
        let timeout = self.timeout;

        // libcurl blocks, keep it off the runtime threads
        let body = tokio::task::spawn_blocking(move || {
            ElevationApi::get_request(&base_url, &api_key, &locations_param, timeout)
        })
        .await
        .map_err(|e| ServiceError::Transport(e.to_string()))??;

        ElevationApi::parse_response(&body, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ok_response() {
        let body = br#"{
            "results": [
                { "elevation": 1608.637939453125, "location": { "lat": 39.7391536, "lng": -104.9847034 }, "resolution": 4.771975994110107 },
                { "elevation": -50.78903579711914, "location": { "lat": 36.455556, "lng": -116.866667 }, "resolution": 19.08790397644043 }
            ],
            "status": "OK"
        }"#;

        let elevations = ElevationApi::parse_response(body, 2).unwrap();

        assert_eq!(elevations.len(), 2);
        assert_eq!(elevations[0].elevation, 1608.637939453125);
        assert_eq!(elevations[1].resolution, 19.08790397644043);
    }

    #[test]
    fn maps_error_statuses() {
        let body = br#"{ "results": [], "status": "OVER_QUERY_LIMIT", "error_message": "You have exceeded your rate-limit for this API." }"#;
        assert_eq!(
            ElevationApi::parse_response(body, 3),
            Err(ServiceError::RateLimited)
        );

        let body = br#"{ "results": [], "status": "REQUEST_DENIED" }"#;
        assert_eq!(
            ElevationApi::parse_response(body, 3),
            Err(ServiceError::RequestDenied)
        );

        let body = br#"{ "status": "MAINTENANCE", "error_message": "back soon" }"#;
        assert_eq!(
            ElevationApi::parse_response(body, 3),
            Err(ServiceError::UnrecognizedStatus("MAINTENANCE: back soon".into()))
        );
    }

    #[test]
    fn rejects_short_results_and_garbage() {
        let body = br#"{ "results": [ { "elevation": 1.0, "resolution": 2.0 } ], "status": "OK" }"#;
        assert_eq!(
            ElevationApi::parse_response(body, 2),
            Err(ServiceError::ResultCountMismatch { expected: 2, got: 1 })
        );

        assert!(matches!(
            ElevationApi::parse_response(b"<html>502</html>", 1),
            Err(ServiceError::Decode(_))
        ));
    }

    #[test]
    fn locations_are_polyline_encoded() {
        let param = ElevationApi::locations_param(&[
            LatLng::new(38.5, -120.2),
            LatLng::new(40.7, -120.95),
            LatLng::new(43.252, -126.453),
        ])
        .unwrap();

        assert_eq!(param, "enc:_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }
}
