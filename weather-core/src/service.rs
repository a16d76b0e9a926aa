//! Background weather fetching with a guarded last-known state.
//!
//! [`WeatherService::start_fetch`] never blocks: it spawns one task per call
//! on the runtime handle given at construction. Each task overwrites the
//! shared [`FetchState`] when it finishes; the latest finisher wins.
//! Readers get whatever is stored at the time of the call.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{error, info, warn};

use crate::{
    model::{FetchError, FetchState, Units, UnitsError, WeatherQuery, WeatherSnapshot},
    provider::WeatherProvider,
};

const TARGET: &str = "weatherclock::weather";

#[derive(Debug, Clone)]
pub struct WeatherService {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    provider: Arc<dyn WeatherProvider>,
    runtime: Handle,
    query: RwLock<WeatherQuery>,
    state: RwLock<FetchState>,
}

impl WeatherService {
    pub fn new(query: WeatherQuery, provider: Arc<dyn WeatherProvider>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                runtime,
                query: RwLock::new(query),
                state: RwLock::new(FetchState::default()),
            }),
        }
    }

    /// Launch one background fetch and return immediately.
    ///
    /// Without an API key no task is spawned: the error is recorded before
    /// this returns and `None` comes back.
    pub fn start_fetch(&self) -> Option<JoinHandle<()>> {
        let query = self.query();

        if !query.has_credentials() {
            warn!(target: TARGET, "No API key configured. Weather data will not be available.");
            write(&self.inner.state).record_failure(FetchError::NoCredentials);
            return None;
        }

        let inner = Arc::clone(&self.inner);
        Some(self.inner.runtime.spawn(async move {
            inner.fetch(query).await;
        }))
    }

    pub fn snapshot(&self) -> Option<Arc<WeatherSnapshot>> {
        read(&self.inner.state).snapshot.clone()
    }

    pub fn error(&self) -> Option<FetchError> {
        read(&self.inner.state).error
    }

    /// Snapshot and error from a single read of the state.
    pub fn state(&self) -> FetchState {
        read(&self.inner.state).clone()
    }

    pub fn query(&self) -> WeatherQuery {
        read(&self.inner.query).clone()
    }

    pub fn set_location(&self, location: impl Into<String>) {
        write(&self.inner.query).location = location.into();
        self.start_fetch();
    }

    pub fn set_api_key(&self, api_key: impl Into<String>) {
        write(&self.inner.query).api_key = api_key.into();
        self.start_fetch();
    }

    /// Switch between `metric` and `imperial`.
    ///
    /// Any other value is logged and returned as an error; the current units
    /// stay in place and no fetch is started.
    pub fn set_units(&self, units: &str) -> Result<(), UnitsError> {
        match Units::try_from(units) {
            Ok(units) => {
                write(&self.inner.query).units = units;
                self.start_fetch();
                Ok(())
            }
            Err(err) => {
                warn!(target: TARGET, "{err}");
                Err(err)
            }
        }
    }
}

impl Inner {
    async fn fetch(&self, query: WeatherQuery) {
        match self.provider.current(&query).await {
            Ok(snapshot) => {
                info!(
                    target: TARGET,
                    "Weather updated for {}: {}, {}",
                    query.location,
                    snapshot.description,
                    snapshot.temperature
                );
                write(&self.state).record_success(snapshot);
            }
            Err(err) => {
                let kind = err.kind();
                match kind {
                    FetchError::ConnectionFailure => {
                        error!(target: TARGET, "Error fetching weather data: {err}")
                    }
                    FetchError::DataFailure => {
                        error!(target: TARGET, "Error parsing weather data: {err}")
                    }
                    _ => error!(target: TARGET, "Unexpected error: {err}"),
                }
                write(&self.state).record_failure(kind);
            }
        }
    }
}

// Every write replaces whole values, so a poisoned lock still holds a
// consistent state.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::provider::{OpenWeatherProvider, ProviderError};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

    /// Provider returning queued outcomes and recording every query it sees.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedProvider {
        outcomes: Mutex<VecDeque<Result<WeatherSnapshot, ProviderError>>>,
        pub(crate) queries: Mutex<Vec<WeatherQuery>>,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedProvider {
        pub(crate) fn push(&self, outcome: Result<WeatherSnapshot, ProviderError>) {
            self.outcomes.lock().unwrap().push_back(outcome);
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn current(&self, query: &WeatherQuery) -> Result<WeatherSnapshot, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Other(anyhow::anyhow!("no outcome queued"))))
        }
    }

    pub(crate) fn sample_snapshot(city: &str, temperature: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature: temperature.into(),
            temp_value: 21.4,
            temp_unit: "°C",
            condition_id: 800,
            main: "Clear".into(),
            description: "Clear sky".into(),
            icon_code: "01d".into(),
            icon_glyph: "☀️",
            city: city.into(),
            country: "FR".into(),
            humidity: "50%".into(),
            wind_speed: 3.2,
            fetched_at: Utc::now(),
        }
    }

    pub(crate) fn query(api_key: &str) -> WeatherQuery {
        WeatherQuery {
            location: "Paris".into(),
            api_key: api_key.into(),
            units: Units::Metric,
        }
    }

    fn service_with(provider: Arc<ScriptedProvider>, api_key: &str) -> WeatherService {
        WeatherService::new(query(api_key), provider, Handle::current())
    }

    async fn fetch_and_wait(service: &WeatherService) {
        service
            .start_fetch()
            .expect("fetch task spawned")
            .await
            .expect("fetch task completed");
    }

    #[tokio::test]
    async fn no_credentials_is_recorded_synchronously() {
        let provider = Arc::new(ScriptedProvider::default());
        let service = service_with(provider.clone(), "");

        let handle = service.start_fetch();

        assert!(handle.is_none());
        assert_eq!(service.error(), Some(FetchError::NoCredentials));
        assert!(service.snapshot().is_none());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn no_credentials_keeps_existing_snapshot() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push(Ok(sample_snapshot("Paris", "21°C")));
        let service = service_with(provider.clone(), "KEY");
        fetch_and_wait(&service).await;

        service.set_api_key("");

        assert_eq!(service.error(), Some(FetchError::NoCredentials));
        assert_eq!(service.snapshot().expect("kept").city, "Paris");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn success_stores_snapshot_and_clears_error() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push(Err(ProviderError::MissingCondition));
        provider.push(Ok(sample_snapshot("Paris", "21°C")));
        let service = service_with(provider, "KEY");

        fetch_and_wait(&service).await;
        assert_eq!(service.error(), Some(FetchError::DataFailure));

        fetch_and_wait(&service).await;
        assert_eq!(service.error(), None);
        assert_eq!(service.snapshot().expect("stored").temperature, "21°C");
    }

    #[tokio::test]
    async fn failure_keeps_previous_snapshot() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push(Ok(sample_snapshot("Paris", "21°C")));
        provider.push(Err(ProviderError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: String::new(),
        }));
        let service = service_with(provider, "KEY");

        fetch_and_wait(&service).await;
        let first = service.snapshot().expect("first snapshot");

        fetch_and_wait(&service).await;
        let state = service.state();
        assert_eq!(state.error, Some(FetchError::ConnectionFailure));
        assert!(Arc::ptr_eq(state.snapshot.as_ref().expect("kept"), &first));
    }

    #[tokio::test]
    async fn unexpected_provider_failure_is_unknown() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push(Err(ProviderError::Other(anyhow::anyhow!("disk on fire"))));
        let service = service_with(provider, "KEY");

        fetch_and_wait(&service).await;

        assert_eq!(service.error(), Some(FetchError::UnknownFailure));
    }

    #[tokio::test]
    async fn set_units_accepts_known_values_and_fetches() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push(Ok(sample_snapshot("Paris", "71°F")));
        provider.push(Ok(sample_snapshot("Paris", "21°C")));
        let service = service_with(provider.clone(), "KEY");

        service.set_units("imperial").expect("imperial accepted");
        assert_eq!(service.query().units, Units::Imperial);
        service.set_units("metric").expect("metric accepted");
        assert_eq!(service.query().units, Units::Metric);

        tokio::time::timeout(Duration::from_secs(1), async {
            while provider.calls() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("two fetches started");
    }

    #[tokio::test]
    async fn set_units_rejects_unknown_value_without_fetching() {
        let provider = Arc::new(ScriptedProvider::default());
        let service = service_with(provider.clone(), "KEY");
        service.set_units("imperial").expect("imperial accepted");
        tokio::time::timeout(Duration::from_secs(1), async {
            while provider.calls() < 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("first fetch started");

        let err = service.set_units("kelvin").unwrap_err();

        assert_eq!(err, UnitsError::Invalid("kelvin".into()));
        assert_eq!(service.query().units, Units::Imperial);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn setters_update_the_next_query() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push(Ok(sample_snapshot("Berlin", "10°C")));
        let service = service_with(provider.clone(), "");

        // No key yet: nothing goes out.
        service.set_location("Berlin");
        assert_eq!(provider.calls(), 0);

        service.set_api_key("NEWKEY");
        tokio::time::timeout(Duration::from_secs(1), async {
            while service.snapshot().is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fetch finished");

        let seen = provider.queries.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].location, "Berlin");
        assert_eq!(seen[0].api_key, "NEWKEY");
    }

    #[tokio::test]
    async fn set_location_with_key_fetches_new_location() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push(Ok(sample_snapshot("Berlin", "10°C")));
        let service = service_with(provider.clone(), "KEY");

        service.set_location("Berlin");
        assert_eq!(service.query().location, "Berlin");
        tokio::time::timeout(Duration::from_secs(1), async {
            while service.snapshot().is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fetch finished");

        assert_eq!(provider.calls(), 1);
        let seen = provider.queries.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].location, "Berlin");
        assert_eq!(seen[0].api_key, "KEY");
        assert_eq!(service.snapshot().expect("stored").city, "Berlin");
    }

    #[tokio::test]
    async fn timeout_leaves_snapshot_and_reports_connection_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let scripted = Arc::new(ScriptedProvider::default());
        scripted.push(Ok(sample_snapshot("Paris", "21°C")));
        let warm = service_with(scripted, "KEY");
        fetch_and_wait(&warm).await;
        let before = warm.snapshot();

        // Same state, now backed by a provider that always times out.
        let http = OpenWeatherProvider::new()
            .with_base_url(server.uri())
            .with_timeout(Duration::from_millis(50));
        let service = WeatherService {
            inner: Arc::new(Inner {
                provider: Arc::new(http),
                runtime: Handle::current(),
                query: RwLock::new(query("KEY")),
                state: RwLock::new(warm.state()),
            }),
        };

        fetch_and_wait(&service).await;

        assert_eq!(service.error(), Some(FetchError::ConnectionFailure));
        assert_eq!(service.snapshot(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reads_during_a_fetch_never_block() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(503).set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let http = OpenWeatherProvider::new().with_base_url(server.uri());
        let service = WeatherService::new(query("KEY"), Arc::new(http), Handle::current());

        let handle = service.start_fetch().expect("spawned");
        assert!(service.snapshot().is_none());
        assert_eq!(service.error(), None);

        handle.await.expect("fetch task completed");
        assert_eq!(service.error(), Some(FetchError::ConnectionFailure));
    }
}
