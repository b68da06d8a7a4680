//! Region discovery for subscription keys.
//!
//! A key is only accepted by the region its Speech resource lives in. The
//! resolver answers "which region?" from stored credentials when it can and
//! otherwise walks the candidate list, one probe at a time, stopping on the
//! first success or the first sign of throttling.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::probe::{ProbeOutcome, RegionProber};
use crate::core::providers::azure::{AzureRegion, CANDIDATE_REGIONS, mask_subscription_key};
use crate::core::store::{SessionStore, StoredCredentials, now_millis};

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(3500);
/// Default pause between two failed probes.
pub const DEFAULT_PROBE_DELAY: Duration = Duration::from_millis(140);
/// Default lifetime of an auto-discovered region.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Why a resolution ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeReason {
    Ok,
    RateLimited,
    NotFound,
    Locked,
    Cached,
}

impl ProbeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Locked => "locked",
            Self::Cached => "cached",
        }
    }
}

impl fmt::Display for ProbeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`RegionResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionProbeResult {
    pub region: Option<String>,
    pub reason: ProbeReason,
}

impl RegionProbeResult {
    fn found(region: impl Into<String>, reason: ProbeReason) -> Self {
        Self {
            region: Some(region.into()),
            reason,
        }
    }

    fn missing(reason: ProbeReason) -> Self {
        Self {
            region: None,
            reason,
        }
    }
}

/// Verdict of the failure-path re-probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    /// The bound region still answers; the failure was transient.
    Transient,
    /// The bound region rejects the key.
    ///
    /// When `locked` is false the cached region has already been forgotten.
    StaleRegion { region: String, locked: bool },
}

/// Tunables for discovery.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub probe_timeout: Duration,
    pub probe_delay: Duration,
    pub cache_ttl: Duration,
    /// Canonical probe order.
    pub candidates: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            probe_delay: DEFAULT_PROBE_DELAY,
            cache_ttl: DEFAULT_CACHE_TTL,
            candidates: CANDIDATE_REGIONS
                .iter()
                .map(|r| r.as_str().to_string())
                .collect(),
        }
    }
}

type PendingResolution = Shared<BoxFuture<'static, RegionProbeResult>>;

/// Finds and remembers the region a subscription key belongs to.
#[derive(Clone)]
pub struct RegionResolver {
    prober: Arc<dyn RegionProber>,
    session: SessionStore,
    config: Arc<ResolverConfig>,
    in_flight: Arc<Mutex<HashMap<String, PendingResolution>>>,
}

impl RegionResolver {
    pub fn new(prober: Arc<dyn RegionProber>, session: SessionStore, config: ResolverConfig) -> Self {
        Self {
            prober,
            session,
            config: Arc::new(config),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves the region for `speech_key`.
    ///
    /// An explicit `override_region` is trusted as-is: it is stored locked and
    /// returned without probing. Otherwise a locked region, then an unexpired
    /// cached one, is reused before any probe is sent.
    pub async fn resolve(&self, speech_key: &str, override_region: Option<&str>) -> RegionProbeResult {
        let speech_key = speech_key.trim();
        if speech_key.is_empty() {
            return RegionProbeResult::missing(ProbeReason::NotFound);
        }

        if let Some(region) = override_region.map(str::trim).filter(|r| !r.is_empty()) {
            let region = normalize_region(region);
            info!("Using explicitly configured region {}", region);
            self.session.save_credentials(&StoredCredentials::new(
                speech_key,
                Some(region.clone()),
                true,
            ));
            return RegionProbeResult::found(region, ProbeReason::Locked);
        }

        let stored = self
            .session
            .credentials()
            .filter(|c| c.matches_key(speech_key));
        let previous = match stored {
            Some(StoredCredentials {
                region: Some(region),
                region_locked: true,
                ..
            }) => {
                debug!("Region {} is locked for this key", region);
                return RegionProbeResult::found(region, ProbeReason::Locked);
            }
            Some(StoredCredentials {
                region: Some(region),
                updated_at,
                ..
            }) => {
                let age = Duration::from_millis(now_millis().saturating_sub(updated_at));
                if age < self.config.cache_ttl {
                    debug!("Reusing cached region {} (age {:?})", region, age);
                    return RegionProbeResult::found(region, ProbeReason::Cached);
                }
                debug!("Cached region {} expired, probing again", region);
                Some(region)
            }
            _ => None,
        };

        self.discover(speech_key, previous).await
    }

    /// Probes candidates, sharing a single in-flight walk per key.
    async fn discover(&self, speech_key: &str, previous: Option<String>) -> RegionProbeResult {
        let pending = {
            let mut in_flight = self.in_flight.lock();
            if let Some(pending) = in_flight.get(speech_key) {
                debug!("Joining in-flight region discovery");
                pending.clone()
            } else {
                let walk = CandidateWalk {
                    prober: self.prober.clone(),
                    session: self.session.clone(),
                    config: self.config.clone(),
                    in_flight: self.in_flight.clone(),
                    speech_key: speech_key.to_string(),
                    previous,
                };
                let pending = walk.run().boxed().shared();
                in_flight.insert(speech_key.to_string(), pending.clone());
                pending
            }
        };
        pending.await
    }

    /// Re-probes only `region` after a mid-playback failure.
    ///
    /// Throttling and transport failures count as transient: only a definite
    /// rejection proves the region stopped accepting the key.
    pub async fn diagnose(&self, speech_key: &str, region: &str) -> Diagnosis {
        let outcome = timed_probe(self.prober.as_ref(), &self.config, speech_key, region).await;
        match outcome {
            ProbeOutcome::Accepted | ProbeOutcome::RateLimited | ProbeOutcome::Unreachable(_) => {
                debug!("Region {} still usable ({:?})", region, outcome);
                Diagnosis::Transient
            }
            ProbeOutcome::Rejected(status) => {
                let locked = self
                    .session
                    .credentials()
                    .filter(|c| c.matches_key(speech_key) && c.region.as_deref() == Some(region))
                    .is_some_and(|c| c.region_locked);
                warn!(
                    "Region {} rejected key {} with status {} (locked: {})",
                    region,
                    mask_subscription_key(speech_key),
                    status,
                    locked
                );
                if !locked {
                    self.session.forget_region(speech_key);
                }
                Diagnosis::StaleRegion {
                    region: region.to_string(),
                    locked,
                }
            }
        }
    }
}

/// One discovery run, owned by the shared future.
struct CandidateWalk {
    prober: Arc<dyn RegionProber>,
    session: SessionStore,
    config: Arc<ResolverConfig>,
    in_flight: Arc<Mutex<HashMap<String, PendingResolution>>>,
    speech_key: String,
    previous: Option<String>,
}

impl CandidateWalk {
    async fn run(self) -> RegionProbeResult {
        let result = self.walk().await;
        self.in_flight.lock().remove(&self.speech_key);
        result
    }

    async fn walk(&self) -> RegionProbeResult {
        let order = probe_order(self.previous.as_deref(), &self.config.candidates);
        let masked = mask_subscription_key(&self.speech_key);
        info!("Discovering region for key {} across {} candidates", masked, order.len());

        let mut candidates = order.iter().peekable();
        while let Some(region) = candidates.next() {
            let outcome =
                timed_probe(self.prober.as_ref(), &self.config, &self.speech_key, region).await;
            match outcome {
                ProbeOutcome::Accepted => {
                    info!("Key {} accepted by region {}", masked, region);
                    self.session.save_credentials(&StoredCredentials::new(
                        self.speech_key.as_str(),
                        Some(region.clone()),
                        false,
                    ));
                    return RegionProbeResult::found(region.as_str(), ProbeReason::Ok);
                }
                ProbeOutcome::RateLimited => {
                    warn!("Region discovery rate limited at {}, aborting", region);
                    return RegionProbeResult::missing(ProbeReason::RateLimited);
                }
                ProbeOutcome::Rejected(status) => {
                    debug!("Region {} rejected the key ({})", region, status);
                }
                ProbeOutcome::Unreachable(reason) => {
                    debug!("Region {} unreachable: {}", region, reason);
                }
            }
            if candidates.peek().is_some() {
                tokio::time::sleep(self.config.probe_delay).await;
            }
        }

        warn!("No candidate region accepted key {}", masked);
        RegionProbeResult::missing(ProbeReason::NotFound)
    }
}

async fn timed_probe(
    prober: &dyn RegionProber,
    config: &ResolverConfig,
    speech_key: &str,
    region: &str,
) -> ProbeOutcome {
    match tokio::time::timeout(config.probe_timeout, prober.probe(speech_key, region)).await {
        Ok(outcome) => outcome,
        Err(_) => ProbeOutcome::Unreachable(format!(
            "timed out after {}ms",
            config.probe_timeout.as_millis()
        )),
    }
}

/// Previously cached region first, then the candidates without duplicates.
fn probe_order(previous: Option<&str>, candidates: &[String]) -> Vec<String> {
    let mut order: Vec<String> = Vec::with_capacity(candidates.len() + 1);
    for region in previous.into_iter().chain(candidates.iter().map(String::as_str)) {
        let region = normalize_region(region);
        if !order.contains(&region) {
            order.push(region);
        }
    }
    order
}

fn normalize_region(region: &str) -> String {
    region
        .parse::<AzureRegion>()
        .unwrap_or_default()
        .as_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryResourceStore;
    use async_trait::async_trait;

    #[derive(Default)]
    struct ScriptedProber {
        outcomes: HashMap<String, ProbeOutcome>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProber {
        fn with(outcomes: &[(&str, ProbeOutcome)]) -> Arc<Self> {
            Arc::new(Self {
                outcomes: outcomes
                    .iter()
                    .map(|(r, o)| (r.to_string(), o.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl RegionProber for ScriptedProber {
        async fn probe(&self, _speech_key: &str, region: &str) -> ProbeOutcome {
            self.calls.lock().push(region.to_string());
            self.outcomes
                .get(region)
                .cloned()
                .unwrap_or(ProbeOutcome::Rejected(401))
        }
    }

    fn config(candidates: &[&str]) -> ResolverConfig {
        ResolverConfig {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            ..ResolverConfig::default()
        }
    }

    fn resolver(prober: Arc<ScriptedProber>, candidates: &[&str]) -> (RegionResolver, SessionStore) {
        let session = SessionStore::new(Arc::new(MemoryResourceStore::new()));
        let resolver = RegionResolver::new(prober, session.clone(), config(candidates));
        (resolver, session)
    }

    #[test]
    fn test_probe_order_puts_previous_first_without_duplicates() {
        let candidates = vec!["eastus".to_string(), "westeurope".to_string()];
        assert_eq!(
            probe_order(Some("WestEurope"), &candidates),
            vec!["westeurope".to_string(), "eastus".to_string()]
        );
        assert_eq!(probe_order(None, &candidates), candidates);
    }

    #[test]
    fn test_probe_reason_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ProbeReason::RateLimited).unwrap(),
            "\"rate_limited\""
        );
        assert_eq!(ProbeReason::NotFound.to_string(), "not_found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_override_is_locked_without_probing() {
        let prober = ScriptedProber::with(&[]);
        let (resolver, session) = resolver(prober.clone(), &["eastus"]);

        let result = resolver.resolve("key", Some(" WestEurope ")).await;
        assert_eq!(result, RegionProbeResult::found("westeurope", ProbeReason::Locked));
        assert!(prober.calls().is_empty());

        let stored = session.credentials().unwrap();
        assert!(stored.region_locked);
        assert_eq!(stored.region.as_deref(), Some("westeurope"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_stores_unlocked_and_reuses_cache() {
        let prober = ScriptedProber::with(&[("westus", ProbeOutcome::Accepted)]);
        let (resolver, session) = resolver(prober.clone(), &["eastus", "westus", "uksouth"]);

        let first = resolver.resolve("key", None).await;
        assert_eq!(first, RegionProbeResult::found("westus", ProbeReason::Ok));
        assert_eq!(prober.calls(), vec!["eastus", "westus"]);
        assert!(!session.credentials().unwrap().region_locked);

        let second = resolver.resolve("key", None).await;
        assert_eq!(second, RegionProbeResult::found("westus", ProbeReason::Cached));
        assert_eq!(prober.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_aborts_walk() {
        let prober = ScriptedProber::with(&[
            ("westus", ProbeOutcome::RateLimited),
            ("uksouth", ProbeOutcome::Accepted),
        ]);
        let (resolver, session) = resolver(prober.clone(), &["eastus", "westus", "uksouth"]);

        let result = resolver.resolve("key", None).await;
        assert_eq!(result, RegionProbeResult::missing(ProbeReason::RateLimited));
        assert_eq!(prober.calls(), vec!["eastus", "westus"]);
        assert!(session.credentials().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_not_found() {
        let prober = ScriptedProber::with(&[]);
        let (resolver, _) = resolver(prober.clone(), &["eastus", "westus"]);

        let result = resolver.resolve("key", None).await;
        assert_eq!(result, RegionProbeResult::missing(ProbeReason::NotFound));
        assert_eq!(prober.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_is_ignored_for_other_key() {
        let prober = ScriptedProber::with(&[("eastus", ProbeOutcome::Accepted)]);
        let (resolver, session) = resolver(prober.clone(), &["eastus"]);
        session.save_credentials(&StoredCredentials::new("other", Some("westus".into()), true));

        let result = resolver.resolve("key", None).await;
        assert_eq!(result.reason, ProbeReason::Ok);
        assert_eq!(prober.calls(), vec!["eastus"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_cache_probes_previous_region_first() {
        let prober = ScriptedProber::with(&[("uksouth", ProbeOutcome::Accepted)]);
        let (resolver, session) = resolver(prober.clone(), &["eastus", "uksouth"]);
        session.save_credentials(&StoredCredentials {
            speech_key: "key".into(),
            region: Some("uksouth".into()),
            region_locked: false,
            updated_at: 0,
        });

        let result = resolver.resolve("key", None).await;
        assert_eq!(result, RegionProbeResult::found("uksouth", ProbeReason::Ok));
        assert_eq!(prober.calls(), vec!["uksouth"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_key_never_probes() {
        let prober = ScriptedProber::with(&[("eastus", ProbeOutcome::Accepted)]);
        let (resolver, _) = resolver(prober.clone(), &["eastus"]);
        let result = resolver.resolve("  ", None).await;
        assert_eq!(result.reason, ProbeReason::NotFound);
        assert!(prober.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_diagnose_forgets_unlocked_region_on_rejection() {
        let prober = ScriptedProber::with(&[]);
        let (resolver, session) = resolver(prober.clone(), &["eastus"]);
        session.save_credentials(&StoredCredentials::new("key", Some("eastus".into()), false));

        let diagnosis = resolver.diagnose("key", "eastus").await;
        assert_eq!(
            diagnosis,
            Diagnosis::StaleRegion {
                region: "eastus".into(),
                locked: false
            }
        );
        assert_eq!(session.credentials().unwrap().region, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_diagnose_keeps_locked_region() {
        let prober = ScriptedProber::with(&[]);
        let (resolver, session) = resolver(prober.clone(), &["eastus"]);
        session.save_credentials(&StoredCredentials::new("key", Some("eastus".into()), true));

        let diagnosis = resolver.diagnose("key", "eastus").await;
        assert!(matches!(diagnosis, Diagnosis::StaleRegion { locked: true, .. }));
        assert_eq!(session.credentials().unwrap().region.as_deref(), Some("eastus"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_diagnose_transient_when_region_answers() {
        let prober = ScriptedProber::with(&[("eastus", ProbeOutcome::Accepted)]);
        let (resolver, _) = resolver(prober.clone(), &["eastus"]);
        assert_eq!(resolver.diagnose("key", "eastus").await, Diagnosis::Transient);
        assert_eq!(prober.calls(), vec!["eastus"]);
    }
}
