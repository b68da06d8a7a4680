//! Region discovery: probing candidate endpoints and remembering the result.

pub mod probe;
pub mod resolver;

pub use probe::{AzureRegionProber, ProbeOutcome, RegionProber};
pub use resolver::{
    DEFAULT_CACHE_TTL, DEFAULT_PROBE_DELAY, DEFAULT_PROBE_TIMEOUT, Diagnosis, ProbeReason,
    RegionProbeResult, RegionResolver, ResolverConfig,
};
