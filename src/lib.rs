use std::{path::Path, time::Duration};

use tokio::sync::mpsc::UnboundedSender;

use data_types::{
    chart::ChartSeries,
    location::{ElevationSource, LocationSequence},
};
use elevation_api::{ElevationApi, ElevationService};
use error::{Error, Result};
use processors::{
    elevation_gain::ElevationGain,
    elevation_sync::{CancelHandle, ElevationSync, SyncEvent, SyncReport},
};
use util::config::Settings;

pub mod data_types;
pub mod elevation_api;
pub mod error;
pub mod processors;
pub mod util;

/// Owns the currently loaded track and everything derived from it.
///
/// Loading a file replaces the track and drops all elevation data fetched for
/// the previous one. A sync borrows the app mutably for its whole run, so a
/// second sync or a reload cannot start until it has finished.
pub struct App<S: ElevationService = ElevationApi> {
    settings: Settings,
    service: Option<S>,
    locations: LocationSequence,
    cancel: CancelHandle,
}

impl App<ElevationApi> {
    /// Uses the Google elevation API when an API key is configured.
    pub fn new(settings: Settings) -> Self {
        let service = settings.has_api_key().then(|| {
            ElevationApi::new(
                &settings.elevation_api.base_url,
                &settings.elevation_api.api_key,
                Duration::from_millis(settings.sync.request_timeout_ms),
            )
        });

        Self {
            settings,
            service,
            locations: LocationSequence::default(),
            cancel: CancelHandle::default(),
        }
    }
}

impl<S: ElevationService> App<S> {
    const CC: &'static str = "App";

    pub fn with_service(settings: Settings, service: S) -> Self {
        Self {
            settings,
            service: Some(service),
            locations: LocationSequence::default(),
            cancel: CancelHandle::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn locations(&self) -> &LocationSequence {
        &self.locations
    }

    pub fn can_sync(&self) -> bool {
        self.service.is_some()
    }

    pub fn load_gpx(&mut self, xml: &str) -> Result<&LocationSequence> {
        let locations = util::gpx::parse_gpx(xml)?;
        Ok(self.replace_track(locations))
    }

    pub fn load_gpx_file(&mut self, path: &Path) -> Result<&LocationSequence> {
        let locations = util::gpx::load_gpx_file(path)?;

        logln!("Loaded {} track points from {}", locations.len(), path.display());

        Ok(self.replace_track(locations))
    }

    fn replace_track(&mut self, locations: LocationSequence) -> &LocationSequence {
        self.locations = locations;
        self.cancel = CancelHandle::default();

        &self.locations
    }

    pub fn recorded_climb(&self) -> ElevationGain {
        self.locations
            .climb(ElevationSource::Recorded, self.settings.climb.noise_threshold_m)
            .unwrap_or_default()
    }

    /// `None` until every point has a service elevation.
    pub fn service_climb(&self) -> Option<ElevationGain> {
        self.locations
            .climb(ElevationSource::Service, self.settings.climb.noise_threshold_m)
    }

    /// Handle cancelling the current, or else the next, sync run.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub async fn sync_elevations(
        &mut self,
        events: Option<UnboundedSender<SyncEvent>>,
    ) -> Result<SyncReport> {
        let service = self.service.as_ref().ok_or(Error::MissingApiKey)?;

        let mut sync = ElevationSync::new(service, self.settings.sync.options())
            .with_cancel_handle(self.cancel.clone());

        if let Some(events) = events {
            sync = sync.with_events(events);
        }

        let report = sync.run(&mut self.locations).await;

        // A cancellation only applies to the run it interrupted
        self.cancel = CancelHandle::default();

        Ok(report?)
    }

    pub fn table(&self) -> String {
        util::table::render_table(&self.locations)
    }

    pub fn chart(&self) -> ChartSeries {
        ChartSeries::from_sequence(&self.locations, self.settings.climb.noise_threshold_m)
    }
}
