use std::{fmt, future::Future, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc::UnboundedSender, watch},
    task::JoinHandle,
};

use crate::{
    data_types::location::{LatLng, LocationSequence, ServiceElevation},
    elevation_api::{ElevationService, ServiceError},
    logln, logvbln,
};

pub const DEFAULT_PAGE_SIZE: usize = 256;
pub const DEFAULT_INTER_REQUEST_DELAY: Duration = Duration::from_millis(1200);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RATE_LIMIT_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Maximum number of locations per request.
    pub page_size: usize,
    /// Wait after a successful page before the next one is sent.
    pub inter_request_delay: Duration,
    pub request_timeout: Duration,
    /// How many times a rate-limited page is resubmitted. Zero aborts on the first refusal.
    pub rate_limit_retries: u32,
    /// First backoff wait, doubled after every further refusal.
    pub retry_base_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            inter_request_delay: DEFAULT_INTER_REQUEST_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

/// Cancels a running sync. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Cancels once `signal` resolves. Aborting the returned task disarms it.
    pub fn cancel_when<F>(&self, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.clone();

        tokio::spawn(async move {
            signal.await;
            cancel.cancel();
        })
    }

    /// Resolves once [`CancelHandle::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();

        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // Sender lives in `self`, so this only happens during teardown
                std::future::pending::<()>().await;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncProgress {
    /// Index of the first point of the page that was just merged.
    pub cursor: usize,
    pub pages_sent: usize,
    pub pages_total: usize,
    pub points_done: usize,
    pub points_total: usize,
    /// Elevations merged for `cursor..points_done`.
    pub merged: Vec<ServiceElevation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    Completed,
    Failed(ServiceError),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub state: SyncState,
    /// Index of the first point not enriched by this run.
    pub cursor: usize,
    pub pages_done: usize,
    pub pages_total: usize,
    pub points_total: usize,
}

impl SyncReport {
    pub fn is_completed(&self) -> bool {
        self.state == SyncState::Completed
    }

    pub fn result(&self) -> Result<(), SyncError> {
        match &self.state {
            SyncState::Completed => Ok(()),
            SyncState::Failed(error) => Err(SyncError::Failed {
                error: error.clone(),
                cursor: self.cursor,
                pages_done: self.pages_done,
                pages_total: self.pages_total,
            }),
            SyncState::Cancelled => Err(SyncError::Cancelled {
                cursor: self.cursor,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Progress(SyncProgress),
    Finished(SyncReport),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    EmptySequence,
    Failed {
        error: ServiceError,
        cursor: usize,
        pages_done: usize,
        pages_total: usize,
    },
    Cancelled {
        cursor: usize,
    },
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::EmptySequence => write!(f, "No track points to fetch elevations for"),
            SyncError::Failed {
                error,
                cursor,
                pages_done,
                pages_total,
            } => write!(
                f,
                "{} (cursor = {}, loaded {} pages of a total of {})",
                error, cursor, pages_done, pages_total
            ),
            SyncError::Cancelled { cursor } => write!(f, "Cancelled at point {}", cursor),
        }
    }
}

impl std::error::Error for SyncError {}

enum PageFailure {
    Cancelled,
    Failed(ServiceError),
}

/// Walks a [`LocationSequence`] page by page, asking the elevation service for
/// each page and merging the answers back in place.
///
/// Pages are sent strictly one after the other with a pause after every
/// successful page. The first failing page ends the run; pages merged before it
/// are kept.
pub struct ElevationSync<'a, S: ElevationService> {
    service: &'a S,
    options: SyncOptions,
    cancel: CancelHandle,
    events: Option<UnboundedSender<SyncEvent>>,
}

impl<'a, S: ElevationService> ElevationSync<'a, S> {
    const CC: &'static str = "ElevationSync";

    pub fn new(service: &'a S, options: SyncOptions) -> Self {
        Self {
            service,
            options,
            cancel: CancelHandle::default(),
            events: None,
        }
    }

    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<SyncEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub async fn run(&self, locations: &mut LocationSequence) -> Result<SyncReport, SyncError> {
        if locations.is_empty() {
            return Err(SyncError::EmptySequence);
        }

        let page_size = self.options.page_size.max(1);
        let points_total = locations.len();
        let pages_total = points_total.div_ceil(page_size);

        let mut cursor: usize = 0;
        let mut pages_done: usize = 0;

        logvbln!(
            "Fetching elevations for {} points in {} pages",
            points_total,
            pages_total
        );

        let state = loop {
            if self.cancel.is_cancelled() {
                break SyncState::Cancelled;
            }

            let page_end = (cursor + page_size).min(points_total);
            let page = locations.coordinates(cursor..page_end);

            let elevations = match self.request_page(&page).await {
                Ok(elevations) => elevations,
                Err(PageFailure::Cancelled) => break SyncState::Cancelled,
                Err(PageFailure::Failed(error)) => break SyncState::Failed(error),
            };

            locations.merge_service_elevations(cursor, &elevations);
            pages_done += 1;

            logvbln!(
                "Merged page {}/{} (points {}..{} of {})",
                pages_done,
                pages_total,
                cursor,
                page_end,
                points_total
            );

            self.emit(SyncEvent::Progress(SyncProgress {
                cursor,
                pages_sent: pages_done,
                pages_total,
                points_done: page_end,
                points_total,
                merged: elevations,
            }));

            cursor = page_end;

            if cursor >= points_total {
                break SyncState::Completed;
            }

            // The service allows about one request per second
            if !self.pause(self.options.inter_request_delay).await {
                break SyncState::Cancelled;
            }
        };

        match &state {
            SyncState::Completed => logln!("All elevation information successfully fetched."),
            SyncState::Failed(error) => {
                logln!("{}", error);
                logln!("cursor = {}", cursor);
                logln!(
                    "Loaded {} pages of a total of {}.",
                    pages_done,
                    pages_total
                );
            }
            SyncState::Cancelled => {
                logln!("Cancelled after {} of {} pages.", pages_done, pages_total)
            }
        }

        let report = SyncReport {
            state,
            cursor,
            pages_done,
            pages_total,
            points_total,
        };

        self.emit(SyncEvent::Finished(report.clone()));

        Ok(report)
    }

    async fn request_page(&self, page: &[LatLng]) -> Result<Vec<ServiceElevation>, PageFailure> {
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(PageFailure::Cancelled);
            }

            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PageFailure::Cancelled),
                response = tokio::time::timeout(
                    self.options.request_timeout,
                    self.service.get_elevations(page),
                ) => response,
            };

            let result = match response {
                Ok(Ok(elevations)) if elevations.len() != page.len() => {
                    Err(ServiceError::ResultCountMismatch {
                        expected: page.len(),
                        got: elevations.len(),
                    })
                }
                Ok(result) => result,
                Err(_) => Err(ServiceError::Timeout(self.options.request_timeout)),
            };

            match result {
                Ok(elevations) => return Ok(elevations),
                Err(error) if error.is_retryable() && attempt < self.options.rate_limit_retries => {
                    let backoff = self
                        .options
                        .retry_base_delay
                        .saturating_mul(1 << attempt.min(16));
                    attempt += 1;

                    logln!(
                        "{}, retrying in {}ms ({}/{})",
                        error,
                        backoff.as_millis(),
                        attempt,
                        self.options.rate_limit_retries
                    );

                    if !self.pause(backoff).await {
                        return Err(PageFailure::Cancelled);
                    }
                }
                Err(error) => return Err(PageFailure::Failed(error)),
            }
        }
    }

    // Returns false when the run was cancelled before or during the wait.
    async fn pause(&self, duration: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(events) = &self.events {
            // Nobody listening is fine
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::data_types::location::LocationPoint;

    /// Answers each call with the next scripted result; once the script runs out
    /// every location gets an elevation of 1.0.
    struct ScriptedService {
        script: Mutex<Vec<Result<(), ServiceError>>>,
        calls: Mutex<Vec<tokio::time::Instant>>,
    }

    impl ScriptedService {
        fn new(mut script: Vec<Result<(), ServiceError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<tokio::time::Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ElevationService for ScriptedService {
        async fn get_elevations(
            &self,
            locations: &[LatLng],
        ) -> Result<Vec<ServiceElevation>, ServiceError> {
            self.calls.lock().unwrap().push(tokio::time::Instant::now());
            let next = self.script.lock().unwrap().pop().unwrap_or(Ok(()));

            next.map(|_| {
                vec![
                    ServiceElevation {
                        elevation: 1.0,
                        resolution: 9.5,
                    };
                    locations.len()
                ]
            })
        }
    }

    fn track(len: usize) -> LocationSequence {
        LocationSequence::new(
            (0..len)
                .map(|i| {
                    LocationPoint::new(
                        "2014-05-01T10:00:00Z",
                        LatLng::new(45.0, 7.0 + i as f64 * 1e-4),
                        0.0,
                    )
                })
                .collect(),
        )
    }

    fn assert_waited(waited: Duration, expected: Duration) {
        assert!(
            waited >= expected && waited < expected + Duration::from_millis(50),
            "waited {:?}, expected {:?}",
            waited,
            expected
        );
    }

    fn options(page_size: usize) -> SyncOptions {
        SyncOptions {
            page_size,
            inter_request_delay: Duration::from_millis(1200),
            request_timeout: Duration::from_secs(5),
            rate_limit_retries: 2,
            retry_base_delay: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_page_backs_off_exponentially() {
        let service = ScriptedService::new(vec![
            Err(ServiceError::RateLimited),
            Err(ServiceError::RateLimited),
        ]);
        let mut seq = track(3);

        let report = ElevationSync::new(&service, options(10)).run(&mut seq).await.unwrap();

        assert!(report.is_completed());
        assert!(seq.is_fully_enriched());

        let calls = service.calls();
        assert_eq!(calls.len(), 3);
        assert_waited(calls[1] - calls[0], Duration::from_secs(2));
        assert_waited(calls[2] - calls[1], Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_fails_once_retries_run_out() {
        let service = ScriptedService::new(vec![Err(ServiceError::RateLimited); 3]);
        let mut seq = track(3);

        let report = ElevationSync::new(&service, options(10)).run(&mut seq).await.unwrap();

        assert_eq!(report.state, SyncState::Failed(ServiceError::RateLimited));
        assert_eq!(service.calls().len(), 3);
        assert_eq!(seq.enriched_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_errors_are_not_retried() {
        let service = ScriptedService::new(vec![Err(ServiceError::RequestDenied)]);
        let mut seq = track(3);

        let report = ElevationSync::new(&service, options(10)).run(&mut seq).await.unwrap();

        assert_eq!(report.state, SyncState::Failed(ServiceError::RequestDenied));
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_sequence_is_rejected() {
        let service = ScriptedService::new(vec![]);
        let mut seq = LocationSequence::default();

        assert_eq!(
            ElevationSync::new(&service, options(10)).run(&mut seq).await,
            Err(SyncError::EmptySequence)
        );
        assert!(service.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_sends_nothing() {
        let service = ScriptedService::new(vec![]);
        let mut seq = track(3);
        let sync = ElevationSync::new(&service, options(1));
        sync.cancel_handle().cancel();

        let report = sync.run(&mut seq).await.unwrap();

        assert_eq!(report.state, SyncState::Cancelled);
        assert_eq!(report.cursor, 0);
        assert!(service.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_watcher_never_cancels() {
        let cancel = CancelHandle::default();

        let watcher = cancel.cancel_when(tokio::time::sleep(Duration::from_secs(1)));
        watcher.abort();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!cancel.is_cancelled());

        let watcher = cancel.cancel_when(tokio::time::sleep(Duration::from_secs(1)));
        watcher.await.unwrap();
        assert!(cancel.is_cancelled());
    }
}
