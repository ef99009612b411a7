// src/blockchain/endpoint_pool.rs

//! In-memory pool of public RPC endpoints with best-effort health tracking.
//!
//! The pool decides the order in which endpoints are tried. An endpoint that
//! keeps failing is moved to the back of the order and cools down for a while,
//! so one unhealthy node does not sit in front of every call. Nothing here is
//! persisted; a restart starts from the configured order again.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

/// Consecutive failed attempts before an endpoint is demoted.
pub const DEFAULT_DEMOTION_THRESHOLD: u32 = 3;
/// How long a demoted endpoint stays behind the healthy ones.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

/// A single RPC endpoint and its health metadata.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub protocol: Protocol,
    pub consecutive_failures: u32,
    pub last_failure_time: Option<Instant>,
    /// Wall-clock twin of `last_failure_time`, for reporting only.
    pub last_failure_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<Instant>,
}

impl Endpoint {
    /// Parse an endpoint URL. Only plain HTTP(S) JSON-RPC endpoints are accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let parsed =
            Url::parse(raw).with_context(|| format!("Invalid RPC endpoint URL: '{}'", raw))?;
        let protocol = match parsed.scheme() {
            "https" => Protocol::Https,
            "http" => Protocol::Http,
            other => {
                return Err(anyhow!(
                    "Unsupported scheme '{}' for RPC endpoint '{}' (expected http or https)",
                    other,
                    raw
                ))
            }
        };

        Ok(Self {
            url: raw.to_string(),
            protocol,
            consecutive_failures: 0,
            last_failure_time: None,
            last_failure_at: None,
            cooldown_until: None,
        })
    }

    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }
}

/// Outcome of a single attempt against an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Read-only view of an endpoint, used by the health tool and `/api/endpoints`.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    pub position: usize,
    pub url: String,
    pub protocol: Protocol,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    pub cooling_down: bool,
}

/// Ordered endpoint list shared by every call made through one client.
///
/// The lock is only held for the duration of a reorder or a snapshot, never
/// across network I/O. Concurrent calls may interleave their updates; the
/// resulting order is a heuristic and nothing depends on it being exact.
#[derive(Debug)]
pub struct EndpointPool {
    endpoints: Mutex<Vec<Endpoint>>,
    demotion_threshold: u32,
    cooldown: Duration,
}

impl EndpointPool {
    pub fn new<S: AsRef<str>>(urls: &[S], demotion_threshold: u32, cooldown: Duration) -> Result<Self> {
        if urls.is_empty() {
            bail!("Endpoint pool needs at least one RPC URL");
        }
        let endpoints = urls
            .iter()
            .map(|u| Endpoint::parse(u.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            endpoints: Mutex::new(endpoints),
            demotion_threshold: demotion_threshold.max(1),
            cooldown,
        })
    }

    /// Pool with the default demotion policy.
    pub fn with_defaults<S: AsRef<str>>(urls: &[S]) -> Result<Self> {
        Self::new(urls, DEFAULT_DEMOTION_THRESHOLD, DEFAULT_COOLDOWN)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Endpoint>> {
        // A panic while holding the guard cannot leave the Vec half-updated in
        // a way that matters for ordering, so poisoning is ignored.
        self.endpoints.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Current trial order: ready endpoints first, in pool order, then the
    /// ones still cooling down. The caller keeps this snapshot for the whole
    /// logical call.
    pub fn next_candidates(&self) -> Vec<Endpoint> {
        self.next_candidates_at(Instant::now())
    }

    pub fn next_candidates_at(&self, now: Instant) -> Vec<Endpoint> {
        let endpoints = self.lock();
        let (ready, cooling): (Vec<Endpoint>, Vec<Endpoint>) = endpoints
            .iter()
            .cloned()
            .partition(|e| !e.is_cooling_down(now));
        ready.into_iter().chain(cooling).collect()
    }

    pub fn record_outcome(&self, url: &str, outcome: Outcome) {
        self.record_outcome_at(url, outcome, Instant::now());
    }

    pub fn record_outcome_at(&self, url: &str, outcome: Outcome, now: Instant) {
        let mut endpoints = self.lock();
        let Some(idx) = endpoints.iter().position(|e| e.url == url) else {
            debug!("Ignoring outcome for unknown endpoint {}", url);
            return;
        };

        match outcome {
            Outcome::Success => {
                let endpoint = &mut endpoints[idx];
                if endpoint.consecutive_failures > 0 || endpoint.cooldown_until.is_some() {
                    info!("Endpoint {} recovered after {} failures", url, endpoint.consecutive_failures);
                }
                endpoint.consecutive_failures = 0;
                endpoint.cooldown_until = None;
            }
            Outcome::Failure => {
                let endpoint = &mut endpoints[idx];
                endpoint.consecutive_failures += 1;
                endpoint.last_failure_time = Some(now);
                endpoint.last_failure_at = Some(Utc::now());

                let should_demote = endpoint.consecutive_failures >= self.demotion_threshold
                    && !endpoint.is_cooling_down(now);
                if should_demote {
                    let mut demoted = endpoints.remove(idx);
                    warn!(
                        "Demoting endpoint {} after {} consecutive failures (cooldown {:?})",
                        demoted.url, demoted.consecutive_failures, self.cooldown
                    );
                    demoted.cooldown_until = Some(now + self.cooldown);
                    endpoints.push(demoted);
                }
            }
        }
    }

    pub fn snapshot(&self) -> Vec<EndpointStatus> {
        let now = Instant::now();
        self.lock()
            .iter()
            .enumerate()
            .map(|(position, e)| EndpointStatus {
                position,
                url: e.url.clone(),
                protocol: e.protocol,
                consecutive_failures: e.consecutive_failures,
                last_failure_at: e.last_failure_at,
                cooling_down: e.is_cooling_down(now),
            })
            .collect()
    }
}
