use std::time::Duration;

use derive_setters::Setters;

use crate::interface::ScanConfig;
use crate::tx::MAX_PACKETS_PER_SECOND;

/// Tunables for an [Engine](crate::engine::Engine).
///
/// The defaults are what the engine ships with. Tests shrink the timings.
#[derive(Clone, Debug, Setters)]
pub struct EngineConfig {
    /// Frames per rolling second across every injection path.
    pub rate_limit: usize,
    pub scan: ScanConfig,
    /// Spoofed MACs kept in the SAE precompute pool.
    pub sae_pool_size: usize,
    /// Commits sent from one pool MAC before rotating to the next.
    pub sae_frames_per_mac: usize,
    /// SAE commit rate before adaptive scaling, frames per second.
    pub sae_base_rate: u32,
    pub sae_stats_interval: Duration,
    pub karma_cache_size: usize,
    pub karma_rotate_interval: Duration,
    pub deauth_interval: Duration,
    pub deauth_report_interval: Duration,
    /// Time a stopping task gets before it is detached.
    pub stop_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            rate_limit: MAX_PACKETS_PER_SECOND,
            scan: ScanConfig::default(),
            sae_pool_size: 8,
            sae_frames_per_mac: 32,
            sae_base_rate: 60,
            sae_stats_interval: Duration::from_secs(5),
            karma_cache_size: 32,
            karma_rotate_interval: Duration::from_millis(5000),
            deauth_interval: Duration::from_millis(50),
            deauth_report_interval: Duration::from_secs(5),
            stop_grace: Duration::from_millis(500),
        }
    }
}
