//! `CoreConfig`: explicit, injected configuration for every engine.
//!
//! Every tunable the core exposes lives on this struct, constructed once at
//! startup and passed by reference into the engines that need it; never a
//! module-level static or `lazy_static`/`OnceCell`.

use std::path::PathBuf;
use std::time::Duration;

use crate::propagation::WalkKind;

/// Observation-weighting mode shared by `SpectralConfig` and
/// `PropagationConfig` defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationWeighting {
    Off,
    Ipw,
}

/// Every environment/config key the core reads, with defaults matching
/// the documented table.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Directory for spectral artifacts (`snapshot.spectral`, etc.).
    pub snapshot_dir: PathBuf,
    /// Per-cache LRU cap. Default 100 for the metrics cache.
    pub cache_max_entries: usize,
    /// Separate LRU cap for cluster views ("default 20 for cluster
    /// views").
    pub cluster_cache_max_entries: usize,
    pub cache_ttl: Duration,
    pub min_cluster_size: usize,
    pub default_granularity: u32,
    pub max_granularity: u32,
    pub propagation_temperature: f32,
    pub propagation_abstain_confidence: f32,
    pub propagation_walk_kind: WalkKind,
    pub observation_weighting: ObservationWeighting,
    pub observation_p_min: f32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("./snapshots"),
            cache_max_entries: 100,
            cluster_cache_max_entries: 20,
            cache_ttl: Duration::from_secs(3600),
            min_cluster_size: 4,
            default_granularity: 25,
            max_granularity: 500,
            propagation_temperature: 2.0,
            propagation_abstain_confidence: 0.15,
            propagation_walk_kind: WalkKind::Symmetric,
            observation_weighting: ObservationWeighting::Off,
            observation_p_min: 0.05,
        }
    }
}

impl CoreConfig {
    /// Read overrides from environment variables, falling back to
    /// [`Default`] for anything unset or unparsable. Mirrors the teacher's
    /// `ServiceState::from_env` convention of reading one prefixed env var
    /// per field rather than a config file.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GRAPH_CORE_SNAPSHOT_DIR") {
            config.snapshot_dir = PathBuf::from(v);
        }
        if let Some(v) = env_usize("GRAPH_CORE_CACHE_MAX_ENTRIES") {
            config.cache_max_entries = v;
        }
        if let Some(v) = env_usize("GRAPH_CORE_CLUSTER_CACHE_MAX_ENTRIES") {
            config.cluster_cache_max_entries = v;
        }
        if let Some(v) = env_usize("GRAPH_CORE_CACHE_TTL_SECONDS") {
            config.cache_ttl = Duration::from_secs(v as u64);
        }
        if let Some(v) = env_usize("GRAPH_CORE_MIN_CLUSTER_SIZE") {
            config.min_cluster_size = v;
        }
        if let Some(v) = env_usize("GRAPH_CORE_DEFAULT_GRANULARITY") {
            config.default_granularity = v as u32;
        }
        if let Some(v) = env_usize("GRAPH_CORE_MAX_GRANULARITY") {
            config.max_granularity = v as u32;
        }
        if let Ok(v) = std::env::var("GRAPH_CORE_PROPAGATION_TEMPERATURE") {
            if let Ok(parsed) = v.parse() {
                config.propagation_temperature = parsed;
            }
        }
        if let Ok(v) = std::env::var("GRAPH_CORE_PROPAGATION_ABSTAIN_CONFIDENCE") {
            if let Ok(parsed) = v.parse() {
                config.propagation_abstain_confidence = parsed;
            }
        }
        if let Ok(v) = std::env::var("GRAPH_CORE_PROPAGATION_WALK_KIND") {
            config.propagation_walk_kind = match v.as_str() {
                "directed_random_walk" => WalkKind::DirectedRandomWalk,
                _ => WalkKind::Symmetric,
            };
        }
        if let Ok(v) = std::env::var("GRAPH_CORE_OBSERVATION_WEIGHTING") {
            config.observation_weighting = match v.as_str() {
                "ipw" => ObservationWeighting::Ipw,
                _ => ObservationWeighting::Off,
            };
        }
        if let Ok(v) = std::env::var("GRAPH_CORE_OBSERVATION_P_MIN") {
            if let Ok(parsed) = v.parse() {
                config.observation_p_min = parsed;
            }
        }

        config
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = CoreConfig::default();
        assert_eq!(config.cache_max_entries, 100);
        assert_eq!(config.cluster_cache_max_entries, 20);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.min_cluster_size, 4);
        assert_eq!(config.default_granularity, 25);
        assert_eq!(config.max_granularity, 500);
        assert_eq!(config.propagation_temperature, 2.0);
        assert_eq!(config.propagation_abstain_confidence, 0.15);
        assert_eq!(config.observation_p_min, 0.05);
    }
}
