//! `discovery.recommend` request shape.

use crate::types::AccountId;

pub const MAX_SEEDS: usize = 20;
pub const MAX_LIMIT: usize = 500;
pub const MAX_OFFSET: usize = 10_000;
pub const DEFAULT_MAX_DISTANCE: u32 = 3;

/// The four composite signal weights, clamped to `[0,1]` and normalized to
/// sum to 1 with four-decimal rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscoveryWeights {
    pub neighbor_overlap: f32,
    pub pagerank: f32,
    pub community: f32,
    pub path_distance: f32,
}

impl Default for DiscoveryWeights {
    fn default() -> Self {
        Self {
            neighbor_overlap: 0.4,
            pagerank: 0.3,
            community: 0.2,
            path_distance: 0.1,
        }
    }
}

impl DiscoveryWeights {
    /// Clamp every field to `[0,1]`; if the resulting vector is all-zero,
    /// revert to [`Default`]; otherwise normalize to sum to 1, rounded to
    /// four decimals ("weights").
    pub fn normalized(self) -> Self {
        let clamped = Self {
            neighbor_overlap: self.neighbor_overlap.clamp(0.0, 1.0),
            pagerank: self.pagerank.clamp(0.0, 1.0),
            community: self.community.clamp(0.0, 1.0),
            path_distance: self.path_distance.clamp(0.0, 1.0),
        };
        let sum = clamped.neighbor_overlap + clamped.pagerank + clamped.community + clamped.path_distance;
        if sum <= 1e-9 {
            return Self::default().normalized_no_fallback();
        }
        Self {
            neighbor_overlap: round4(clamped.neighbor_overlap / sum),
            pagerank: round4(clamped.pagerank / sum),
            community: round4(clamped.community / sum),
            path_distance: round4(clamped.path_distance / sum),
        }
    }

    fn normalized_no_fallback(self) -> Self {
        let sum = self.neighbor_overlap + self.pagerank + self.community + self.path_distance;
        Self {
            neighbor_overlap: round4(self.neighbor_overlap / sum),
            pagerank: round4(self.pagerank / sum),
            community: round4(self.community / sum),
            path_distance: round4(self.path_distance / sum),
        }
    }
}

fn round4(v: f32) -> f32 {
    (v * 10_000.0).round() / 10_000.0
}

/// Post-scoring filters.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryFilters {
    /// Single-seed mode only: drop accounts the seed already follows.
    pub exclude_following: bool,
    pub max_distance: Option<u32>,
    /// Auto-capped at `seeds.len()` if larger.
    pub min_overlap: Option<f32>,
    pub min_followers: Option<u64>,
    pub max_followers: Option<u64>,
    pub include_communities: Vec<String>,
    pub exclude_communities: Vec<String>,
    pub include_shadow: bool,
}

/// `discover(request)` input.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub seeds: Vec<AccountId>,
    pub weights: DiscoveryWeights,
    pub filters: DiscoveryFilters,
    pub limit: usize,
    pub offset: usize,
}

impl Default for DiscoveryRequest {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            weights: DiscoveryWeights::default(),
            filters: DiscoveryFilters::default(),
            limit: 50,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = DiscoveryWeights::default().normalized();
        let sum = w.neighbor_overlap + w.pagerank + w.community + w.path_distance;
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn all_zero_weights_revert_to_default() {
        let w = DiscoveryWeights { neighbor_overlap: 0.0, pagerank: 0.0, community: 0.0, path_distance: 0.0 };
        let normalized = w.normalized();
        assert_eq!(normalized, DiscoveryWeights::default().normalized());
    }

    #[test]
    fn negative_weights_are_clamped_before_normalizing() {
        let w = DiscoveryWeights { neighbor_overlap: -5.0, pagerank: 1.0, community: 0.0, path_distance: 0.0 };
        let normalized = w.normalized();
        assert_eq!(normalized.neighbor_overlap, 0.0);
        assert_eq!(normalized.pagerank, 1.0);
    }
}
