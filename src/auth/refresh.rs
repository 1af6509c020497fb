//! Key distribution refresh.
//!
//! # Responsibilities
//! - Fetch the key id → PEM map from the distribution endpoint
//! - Derive the cache lifetime from `cache-control: max-age`
//! - Schedule the next refresh as a one-shot successor task
//! - Retry failed fetches with bounded backoff
//!
//! # Design Decisions
//! - At most one renewal is pending; scheduling a new one aborts the old
//! - A forced refresh starts a new chain that supersedes the pending one
//! - When retries are exhausted the chain stops and the stale keys stay live

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use reqwest::header::CACHE_CONTROL;
use tokio::task::AbortHandle;
use url::Url;

use crate::auth::error::KeyFetchError;
use crate::auth::keys::{KeyCache, KeySet, DEFAULT_MAX_AGE};
use crate::config::AuthConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Extract the `max-age` directive, in seconds, from a cache-control value.
///
/// Directive names are case-insensitive; the first `max-age` wins even if
/// it does not parse.
pub fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|directive| {
            let (name, value) = directive.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("max-age")
                .then(|| value.trim().trim_matches('"'))
        })
        .and_then(|value| value.parse().ok())
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

#[derive(Debug)]
struct Renewal {
    generation: u64,
    due: Instant,
    attempt: u32,
    handle: AbortHandle,
}

#[derive(Debug, Default)]
struct Schedule {
    generation: u64,
    pending: Option<Renewal>,
    /// Set by `stop`; a renewal already running when it lands schedules no successor.
    stopped: bool,
}

/// Keeps a [`KeyCache`] fresh by following the endpoint's cache policy.
#[derive(Debug)]
pub struct KeyRefresher {
    cache: Arc<KeyCache>,
    client: reqwest::Client,
    endpoint: Url,
    retry: RetryPolicy,
    min_renewal: Duration,
    schedule: Mutex<Schedule>,
}

impl KeyRefresher {
    /// Build a refresher for the endpoint and proxy named in `config`.
    ///
    /// An unparsable proxy is logged and the endpoint is reached directly.
    pub fn new(cache: Arc<KeyCache>, config: &AuthConfig) -> Result<Self, KeyFetchError> {
        let endpoint: Url = config
            .keys_url
            .parse()
            .map_err(|e| KeyFetchError::InvalidEndpoint(format!("'{}': {}", config.keys_url, e)))?;

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs));
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        if let Some(proxy_url) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            match reqwest::Proxy::all(proxy_url) {
                Ok(proxy) => {
                    tracing::info!(proxy = %proxy_url, "Fetching keys through proxy");
                    builder = builder.proxy(proxy);
                }
                Err(e) => {
                    tracing::warn!(proxy = %proxy_url, error = %e, "Ignoring invalid proxy URL");
                }
            }
        }

        Ok(Self {
            cache,
            client: builder.build()?,
            endpoint,
            retry: RetryPolicy {
                attempts: config.retry_attempts,
                base_delay_ms: config.retry_base_delay_ms,
                max_delay_ms: config.retry_max_delay_ms,
            },
            min_renewal: Duration::from_secs(config.min_renewal_secs),
            schedule: Mutex::new(Schedule::default()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch once and publish the result. Does not touch the schedule.
    ///
    /// Returns the lifetime the endpoint granted the new keys.
    pub async fn refresh(&self) -> Result<Duration, KeyFetchError> {
        let response = self.client.get(self.endpoint.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(KeyFetchError::Status(status.as_u16()));
        }

        let max_age = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_MAX_AGE);

        let keys: HashMap<String, String> = response
            .json()
            .await
            .map_err(|e| KeyFetchError::Decode(e.to_string()))?;

        let count = keys.len();
        self.cache.replace(KeySet::new(keys, max_age));
        tracing::info!(
            endpoint = %self.endpoint,
            keys = count,
            max_age_secs = max_age.as_secs(),
            "Verification keys updated"
        );
        Ok(max_age)
    }

    /// Run the first refresh and start the renewal chain.
    pub async fn start(self: &Arc<Self>) -> Result<Duration, KeyFetchError> {
        self.force_refresh().await
    }

    /// Refresh now, superseding any pending renewal. Restarts a stopped chain.
    pub async fn force_refresh(self: &Arc<Self>) -> Result<Duration, KeyFetchError> {
        {
            let mut schedule = self.lock_schedule();
            schedule.stopped = false;
            cancel(&mut schedule);
        }
        Arc::clone(self).cycle(0).await
    }

    /// End the chain: abort the pending renewal and keep any renewal that
    /// is already running from scheduling a successor.
    pub fn stop(&self) {
        let mut schedule = self.lock_schedule();
        schedule.stopped = true;
        if cancel(&mut schedule) {
            tracing::info!(endpoint = %self.endpoint, "Key renewal stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.lock_schedule().stopped
    }

    /// Deadline of the pending renewal, if one is scheduled.
    pub fn next_renewal(&self) -> Option<Instant> {
        self.lock_schedule().pending.as_ref().map(|r| r.due)
    }

    /// Retry attempt the pending renewal will make, 0 for a regular renewal.
    pub fn pending_attempt(&self) -> Option<u32> {
        self.lock_schedule().pending.as_ref().map(|r| r.attempt)
    }

    fn renewal_delay(&self, max_age: Duration) -> Duration {
        max_age
            .saturating_sub(Duration::from_secs(1))
            .max(self.min_renewal)
    }

    async fn cycle(self: Arc<Self>, attempt: u32) -> Result<Duration, KeyFetchError> {
        match self.refresh().await {
            Ok(max_age) => {
                metrics::record_key_refresh("success");
                self.schedule(self.renewal_delay(max_age), 0);
                Ok(max_age)
            }
            Err(e) => {
                metrics::record_key_refresh("failure");
                if attempt < self.retry.attempts {
                    let next = attempt + 1;
                    let delay =
                        calculate_backoff(next, self.retry.base_delay_ms, self.retry.max_delay_ms);
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        error = %e,
                        attempt = next,
                        delay = ?delay,
                        "Key fetch failed, retrying"
                    );
                    self.schedule(delay, next);
                } else {
                    tracing::error!(
                        endpoint = %self.endpoint,
                        error = %e,
                        cached_keys = self.cache.len(),
                        "Key fetch failed, renewal stopped; serving cached keys"
                    );
                }
                Err(e)
            }
        }
    }

    fn schedule(self: &Arc<Self>, delay: Duration, attempt: u32) {
        let mut schedule = self.lock_schedule();
        if schedule.stopped {
            tracing::debug!(attempt, "Key renewal stopped, not rescheduling");
            return;
        }
        schedule.generation += 1;
        let generation = schedule.generation;

        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !this.claim(generation) {
                return;
            }
            let _ = this.cycle(attempt).await;
        });

        let renewal = Renewal {
            generation,
            due: Instant::now() + delay,
            attempt,
            handle: task.abort_handle(),
        };
        if let Some(previous) = schedule.pending.replace(renewal) {
            previous.handle.abort();
        }
        tracing::debug!(delay = ?delay, attempt, "Key renewal scheduled");
    }

    /// Take ownership of the pending slot for a renewal that just woke up.
    fn claim(&self, generation: u64) -> bool {
        let mut schedule = self.lock_schedule();
        match schedule.pending.as_ref() {
            Some(r) if r.generation == generation => {
                schedule.pending = None;
                true
            }
            _ => false,
        }
    }

    fn lock_schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn cancel(schedule: &mut Schedule) -> bool {
    match schedule.pending.take() {
        Some(renewal) => {
            renewal.handle.abort();
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_max_age() {
        assert_eq!(parse_max_age("public, max-age=19204, must-revalidate, no-transform"), Some(19204));
        assert_eq!(parse_max_age("max-age=120"), Some(120));
        assert_eq!(parse_max_age("public,max-age=60"), Some(60));
        assert_eq!(parse_max_age("Max-Age=30"), Some(30));
        assert_eq!(parse_max_age("max-age=\"45\""), Some(45));
    }

    #[test]
    fn test_parse_max_age_absent_or_invalid() {
        assert_eq!(parse_max_age(""), None);
        assert_eq!(parse_max_age("no-cache, no-store"), None);
        assert_eq!(parse_max_age("max-age=soon"), None);
        assert_eq!(parse_max_age("max-age=-5"), None);
        assert_eq!(parse_max_age("s-maxage=10"), None);
        // First directive wins even when invalid
        assert_eq!(parse_max_age("max-age=x, max-age=10"), None);
    }

    fn refresher(min_renewal_secs: u64) -> KeyRefresher {
        let config = AuthConfig {
            keys_url: "http://127.0.0.1:9/certs".into(),
            min_renewal_secs,
            ..AuthConfig::default()
        };
        KeyRefresher::new(Arc::new(KeyCache::new()), &config).unwrap()
    }

    #[test]
    fn test_renewal_delay_is_one_second_early() {
        let r = refresher(1);
        assert_eq!(r.renewal_delay(Duration::from_secs(120)), Duration::from_secs(119));
        assert_eq!(r.renewal_delay(DEFAULT_MAX_AGE), Duration::from_secs(3599));
        // Floors at the minimum renewal so max-age=0 cannot spin
        assert_eq!(r.renewal_delay(Duration::from_secs(0)), Duration::from_secs(1));
        assert_eq!(refresher(30).renewal_delay(Duration::from_secs(10)), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = AuthConfig {
            keys_url: "not a url".into(),
            ..AuthConfig::default()
        };
        let err = KeyRefresher::new(Arc::new(KeyCache::new()), &config).unwrap_err();
        assert!(matches!(err, KeyFetchError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_invalid_proxy_is_ignored() {
        let config = AuthConfig {
            proxy: Some("::not a proxy::".into()),
            ..AuthConfig::default()
        };
        assert!(KeyRefresher::new(Arc::new(KeyCache::new()), &config).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_keeps_cache_and_stops() {
        let config = AuthConfig {
            keys_url: "http://127.0.0.1:9/certs".into(),
            retry_attempts: 0,
            system_proxy: false,
            ..AuthConfig::default()
        };
        let cache = Arc::new(KeyCache::new());
        cache.replace(KeySet::new(
            HashMap::from([("kid".to_string(), "pem".to_string())]),
            Duration::from_secs(60),
        ));
        let refresher = Arc::new(KeyRefresher::new(cache.clone(), &config).unwrap());

        assert!(refresher.start().await.is_err());
        assert_eq!(cache.get("kid").as_deref(), Some("pem"));
        assert!(refresher.next_renewal().is_none());
    }

    #[tokio::test]
    async fn test_failure_schedules_bounded_retry() {
        let config = AuthConfig {
            keys_url: "http://127.0.0.1:9/certs".into(),
            retry_attempts: 2,
            retry_base_delay_ms: 60_000,
            retry_max_delay_ms: 60_000,
            system_proxy: false,
            ..AuthConfig::default()
        };
        let refresher = Arc::new(KeyRefresher::new(Arc::new(KeyCache::new()), &config).unwrap());

        assert!(refresher.start().await.is_err());
        assert_eq!(refresher.pending_attempt(), Some(1));
        let due = refresher.next_renewal().unwrap();
        assert!(due > Instant::now() + Duration::from_secs(50));

        refresher.stop();
        assert!(refresher.next_renewal().is_none());
    }

    #[tokio::test]
    async fn test_running_renewal_does_not_outlive_stop() {
        let refresher = Arc::new(refresher(1));
        refresher.stop();
        // What a renewal that woke up before `stop` does once its fetch returns
        refresher.schedule(Duration::from_secs(60), 0);
        assert!(refresher.is_stopped());
        assert!(refresher.next_renewal().is_none());
    }

    #[tokio::test]
    async fn test_force_refresh_restarts_stopped_chain() {
        let config = AuthConfig {
            keys_url: "http://127.0.0.1:9/certs".into(),
            retry_attempts: 1,
            retry_base_delay_ms: 60_000,
            retry_max_delay_ms: 60_000,
            system_proxy: false,
            ..AuthConfig::default()
        };
        let refresher = Arc::new(KeyRefresher::new(Arc::new(KeyCache::new()), &config).unwrap());
        refresher.stop();

        assert!(refresher.force_refresh().await.is_err());
        assert!(!refresher.is_stopped());
        assert_eq!(refresher.pending_attempt(), Some(1));
        refresher.stop();
    }
}
