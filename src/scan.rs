use std::sync::{Arc, RwLock};
use std::time::Duration;

use log::{info, warn};

use crate::devices::AccessPoint;
use crate::error::EngineError;
use crate::interface::{RadioDriver, ScanConfig, WifiMode};

/// Scan results beyond this are dropped.
pub const MAX_SCANNED_APS: usize = 100;

/// Immutable view of the last scan. Readers keep their snapshot even if a
/// new scan replaces the set underneath them.
pub type ScanResultSet = Arc<Vec<AccessPoint>>;

pub struct ScanController {
    radio: Arc<dyn RadioDriver>,
    config: ScanConfig,
    results: RwLock<ScanResultSet>,
}

impl ScanController {
    pub fn new(radio: Arc<dyn RadioDriver>, config: ScanConfig) -> Self {
        ScanController {
            radio,
            config,
            results: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Put the radio in station mode and run a blocking scan. A zero
    /// timeout uses the configured default.
    pub fn start_scan(&self, timeout: Duration) -> Result<(), EngineError> {
        self.clear_results();

        if self.radio.mode()? != WifiMode::Station {
            self.radio.set_mode(WifiMode::Station)?;
        }
        self.radio.start()?;

        let config = if timeout.is_zero() {
            self.config.clone()
        } else {
            self.config.clone().timeout(timeout)
        };
        info!("Scanning for access points ({}s)", config.timeout.as_secs());
        self.radio.scan(&config)?;
        Ok(())
    }

    /// Collect the finished scan into a new result set.
    ///
    /// The buffer is reserved up front. If that fails the previous results
    /// are gone and the caller gets [EngineError::Allocation].
    pub fn stop_scan(&self) -> Result<ScanResultSet, EngineError> {
        let count = self.radio.scan_result_count()?;

        let mut records: Vec<AccessPoint> = Vec::new();
        if let Err(e) = records.try_reserve_exact(count) {
            warn!("Could not allocate {count} scan records: {e}");
            self.clear_results();
            return Err(EngineError::Allocation { requested: count });
        }
        self.radio.scan_results(&mut records, count)?;

        if records.len() > MAX_SCANNED_APS {
            warn!(
                "Scan found {} access points, keeping the first {MAX_SCANNED_APS}",
                records.len()
            );
            records.truncate(MAX_SCANNED_APS);
        }

        info!("Found {} access points", records.len());
        let set = Arc::new(records);
        self.replace(set.clone());
        Ok(set)
    }

    pub fn clear_results(&self) {
        self.replace(Arc::new(Vec::new()));
    }

    /// Current result set. Cheap, it only clones the `Arc`.
    pub fn results(&self) -> ScanResultSet {
        match self.results.read() {
            Ok(results) => results.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, set: ScanResultSet) {
        match self.results.write() {
            Ok(mut results) => *results = set,
            Err(poisoned) => *poisoned.into_inner() = set,
        }
    }
}
