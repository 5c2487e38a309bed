use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::info;

use crate::attack::{AttackOrchestrator, AttackState, BeaconList, BeaconMode, DeauthTarget};
use crate::config::EngineConfig;
use crate::crypto::{P256Sae, SaeCrypto};
use crate::devices::{AccessPoint, Station};
use crate::error::EngineError;
use crate::hopper::{
    build_channel_list, live_ap_channels, station_scan_channels, ChannelHopScheduler, HopMode,
};
use crate::interface::{Collaborators, FrameCallback, RxFrame};
use crate::karma::KarmaEngine;
use crate::rx::{ReceivePath, RxOwner};
use crate::sae::{SaeFloodEngine, SaeState, SaeStats};
use crate::scan::{ScanController, ScanResultSet};
use crate::stations::StationCorrelator;
use crate::targets::{SelectedAp, TargetSelection};
use crate::track::{SignalTracker, TrackReading};
use crate::tx::FrameInjector;

/// Everything the attack engine owns, in one place.
///
/// Components share the radio through [Collaborators]. Only one promiscuous
/// callback is installed at a time: starting the sniffer, SAE flood, karma or
/// tracking takes the [ReceivePath] over, and stopping a component that has
/// since lost it leaves the new owner's callback in place.
pub struct Engine {
    collaborators: Collaborators,
    injector: Arc<FrameInjector>,
    scan: Arc<ScanController>,
    stations: Arc<StationCorrelator>,
    hopper: ChannelHopScheduler,
    attacks: AttackOrchestrator,
    sae: SaeFloodEngine,
    karma: KarmaEngine,
    tracker: SignalTracker,
    rx: Arc<ReceivePath>,
    selection: Mutex<TargetSelection>,
}

impl Engine {
    pub fn new(collaborators: Collaborators, config: EngineConfig) -> Self {
        Engine::with_crypto(collaborators, config, Arc::new(P256Sae))
    }

    pub fn with_crypto(
        collaborators: Collaborators,
        config: EngineConfig,
        crypto: Arc<dyn SaeCrypto>,
    ) -> Self {
        let radio = collaborators.radio.clone();
        let injector = Arc::new(FrameInjector::new(radio.clone(), config.rate_limit));
        let scan = Arc::new(ScanController::new(radio.clone(), config.scan.clone()));
        let stations = Arc::new(StationCorrelator::new(collaborators.clone()));
        let rx = Arc::new(ReceivePath::new(radio.clone()));

        Engine {
            hopper: ChannelHopScheduler::new(radio),
            attacks: AttackOrchestrator::new(
                collaborators.clone(),
                injector.clone(),
                scan.clone(),
                stations.clone(),
                config.clone(),
            ),
            sae: SaeFloodEngine::new(
                collaborators.clone(),
                injector.clone(),
                rx.clone(),
                crypto,
                config.clone(),
            ),
            karma: KarmaEngine::new(collaborators.clone(), injector.clone(), rx.clone(), config),
            tracker: SignalTracker::new(collaborators.clone(), rx.clone()),
            collaborators,
            injector,
            scan,
            stations,
            rx,
            selection: Mutex::new(TargetSelection::None),
        }
    }

    pub fn injector(&self) -> &Arc<FrameInjector> {
        &self.injector
    }

    pub fn hopper(&self) -> &ChannelHopScheduler {
        &self.hopper
    }

    /// The component whose callback is currently installed.
    pub fn rx_owner(&self) -> Option<RxOwner> {
        self.rx.owner()
    }

    ///////////////////////////////
    // Scanning

    /// Start a blocking scan. Selections, stations and previous results
    /// are dropped first.
    pub fn start_scan(&self, timeout: Duration) -> Result<(), EngineError> {
        self.clear_selection();
        self.stations.clear();
        self.stations.set_known_aps(Arc::new(Vec::new()));
        self.scan.start_scan(timeout)
    }

    pub fn stop_scan(&self) -> Result<ScanResultSet, EngineError> {
        let results = match self.scan.stop_scan() {
            Ok(results) => results,
            Err(e) => {
                self.stations.set_known_aps(Arc::new(Vec::new()));
                return Err(e);
            }
        };

        for (index, ap) in results.iter().enumerate() {
            info!(
                "[{index}] {} ({}) ch {} {} dBm {} [{}]",
                ap.display_ssid(),
                ap.bssid,
                ap.channel,
                ap.rssi,
                ap.auth_mode,
                self.collaborators.vendor_or_unknown(&ap.bssid)
            );
        }
        self.stations.set_known_aps(results.clone());
        Ok(results)
    }

    pub fn get_scan_results(&self) -> ScanResultSet {
        self.scan.results()
    }

    ///////////////////////////////
    // Target selection

    pub fn select_ap(&self, index: usize) -> Result<AccessPoint, EngineError> {
        let ap = self.ap_at(index)?;
        info!(
            "Selected Access Point: {} ({}) channel {}",
            ap.display_ssid(),
            ap.bssid,
            ap.channel
        );
        self.set_selection(TargetSelection::SingleAp(SelectedAp::new(index, &ap)));
        self.collaborators
            .display
            .show_status(&format!("Selected {}", ap.display_ssid()));
        Ok(ap)
    }

    /// Select several APs. The first index is the primary target. Nothing
    /// changes unless every index is valid.
    pub fn select_multiple_aps(&self, indices: &[usize]) -> Result<(), EngineError> {
        if indices.is_empty() {
            return Err(EngineError::invalid_target("No AP indices given"));
        }
        let results = self.scan.results();
        let selected = indices
            .iter()
            .map(|&index| {
                results
                    .get(index)
                    .map(|ap| SelectedAp::new(index, ap))
                    .ok_or_else(|| out_of_range(index, results.len()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!("Selected {} access points:", selected.len());
        for (position, selected_ap) in selected.iter().enumerate() {
            let ap = &results[selected_ap.index];
            info!(
                "  [{}] {} ({}) channel {}{}",
                selected_ap.index,
                ap.display_ssid(),
                ap.bssid,
                ap.channel,
                if position == 0 { " (Primary)" } else { "" }
            );
        }
        self.set_selection(TargetSelection::MultiAp(selected));
        Ok(())
    }

    pub fn select_station(&self, index: usize) -> Result<Station, EngineError> {
        let station = self.stations.get(index).ok_or_else(|| {
            EngineError::invalid_target(format!(
                "Invalid station index {index}, {} stations known",
                self.stations.stations().len()
            ))
        })?;
        info!("Selected Station: {}", station);
        self.set_selection(TargetSelection::Station(station));
        Ok(station)
    }

    pub fn selection(&self) -> TargetSelection {
        self.selection
            .lock()
            .map(|selection| selection.clone())
            .unwrap_or_default()
    }

    pub fn clear_selection(&self) {
        self.set_selection(TargetSelection::None);
    }

    /// The selected APs, resolved against the current scan, primary first.
    pub fn get_selected_aps(&self) -> Result<Vec<AccessPoint>, EngineError> {
        let results = self.scan.results();
        Ok(self
            .selection()
            .resolve(&results)?
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn stations(&self) -> Vec<Station> {
        self.stations.stations()
    }

    fn set_selection(&self, selection: TargetSelection) {
        if let Ok(mut current) = self.selection.lock() {
            *current = selection;
        }
    }

    fn ap_at(&self, index: usize) -> Result<AccessPoint, EngineError> {
        let results = self.scan.results();
        results
            .get(index)
            .cloned()
            .ok_or_else(|| out_of_range(index, results.len()))
    }

    fn primary_ap(&self) -> Result<AccessPoint, EngineError> {
        let primary = self
            .selection()
            .primary()
            .ok_or_else(|| EngineError::invalid_target("No AP selected"))?;
        let results = self.scan.results();
        primary.resolve(&results).cloned()
    }

    /// Channel of `station`'s AP in the current scan.
    fn station_channel(&self, station: &Station) -> Option<u8> {
        self.scan
            .results()
            .iter()
            .find(|ap| ap.bssid == station.bssid)
            .map(|ap| ap.channel)
    }

    ///////////////////////////////
    // Monitor mode and hopping

    /// Sniff for stations talking to scanned APs while hopping over their
    /// channels.
    pub fn start_station_scan(&self) -> Result<(), EngineError> {
        let results = self.scan.results();
        if results.is_empty() {
            return Err(EngineError::invalid_target(
                "No access points found, run a scan first",
            ));
        }

        let stations = self.stations.clone();
        let callback: FrameCallback = Arc::new(move |frame: &RxFrame| {
            stations.on_frame(&frame.payload);
        });
        self.rx.claim(RxOwner::StationScan, callback)?;

        let channels = station_scan_channels(results.iter().map(|ap| ap.channel));
        if let Err(e) = self.hopper.start_mode(HopMode::StationScan, channels) {
            self.stop_monitor_mode();
            return Err(e);
        }
        self.collaborators.display.show_status("Station Scan");
        Ok(())
    }

    /// Stop sniffing and every hop mode.
    pub fn stop_monitor_mode(&self) {
        self.hopper.stop();
        if self.rx.release(RxOwner::StationScan) {
            info!("Monitor mode stopped");
        }
    }

    /// Hop the regulatory channel list for the configured country.
    pub fn start_capture_hop(&self) -> Result<(), EngineError> {
        let country = self.collaborators.settings.wifi_country();
        self.hopper
            .start_mode(HopMode::Capture, build_channel_list(&country))
    }

    pub fn start_live_ap_hop(&self) -> Result<(), EngineError> {
        self.hopper.start_mode(HopMode::LiveAp, live_ap_channels())
    }

    /// Stop hopping and stay on `channel`.
    pub fn set_fixed_channel(&self, channel: u8) -> Result<(), EngineError> {
        self.hopper.set_fixed_channel(channel)
    }

    ///////////////////////////////
    // Deauth and beacons

    /// Deauth whatever is selected: nothing means every scanned AP.
    pub fn start_deauth(&self) -> Result<(), EngineError> {
        let target = match self.selection() {
            TargetSelection::None => DeauthTarget::Broadcast,
            selection @ (TargetSelection::SingleAp(_) | TargetSelection::MultiAp(_)) => {
                let results = self.scan.results();
                DeauthTarget::Aps(selection.resolve(&results)?.into_iter().cloned().collect())
            }
            TargetSelection::Station(station) => {
                let channel = self
                    .station_channel(&station)
                    .or_else(|| self.collaborators.radio.channel().ok())
                    .unwrap_or(1);
                DeauthTarget::Station { station, channel }
            }
        };
        self.attacks.start_deauth(target)
    }

    /// Deauth every scanned BSSID broadcasting `ssid`.
    pub fn start_deauth_ssid(&self, ssid: &str) -> Result<(), EngineError> {
        self.attacks.start_deauth(DeauthTarget::Ssid(ssid.to_string()))
    }

    pub fn stop_deauth(&self) -> bool {
        self.attacks.stop_deauth()
    }

    pub fn deauth_packets_sent(&self) -> u64 {
        self.attacks.deauth_packets_sent()
    }

    pub fn start_beacon(&self, mode: BeaconMode) -> Result<(), EngineError> {
        self.attacks.start_beacon(mode)
    }

    pub fn stop_beacon(&self) -> bool {
        self.attacks.stop_beacon()
    }

    pub fn beacon_list(&self) -> Arc<Mutex<BeaconList>> {
        self.attacks.beacon_list()
    }

    pub fn attack_state(&self) -> AttackState {
        self.attacks.state()
    }

    ///////////////////////////////
    // SAE

    /// Flood the primary selected AP with SAE commits.
    pub fn start_sae_flood(&self, password: &str) -> Result<(), EngineError> {
        let target = self.primary_ap()?;
        self.sae.start_sae_flood(&target, password)
    }

    pub fn stop_sae_flood(&self) -> bool {
        self.sae.stop_sae_flood()
    }

    pub fn sae(&self) -> &SaeFloodEngine {
        &self.sae
    }

    pub fn sae_state(&self) -> SaeState {
        self.sae.state()
    }

    pub fn sae_stats(&self) -> SaeStats {
        self.sae.stats()
    }

    ///////////////////////////////
    // Karma

    pub fn start_karma(&self) -> Result<(), EngineError> {
        self.karma.start_karma()
    }

    pub fn stop_karma(&self) -> bool {
        self.karma.stop_karma()
    }

    pub fn set_karma_ssids(&self, ssids: &[String]) {
        self.karma.set_karma_ssids(ssids)
    }

    pub fn karma(&self) -> &KarmaEngine {
        &self.karma
    }

    ///////////////////////////////
    // Tracking

    pub fn track_ap(&self) -> Result<(), EngineError> {
        let ap = self.primary_ap()?;
        self.tracker.track_ap(&ap)
    }

    pub fn track_sta(&self) -> Result<(), EngineError> {
        let station = self
            .selection()
            .station()
            .ok_or_else(|| EngineError::invalid_target("No station selected"))?;
        let channel = self.station_channel(&station).unwrap_or(1);
        self.tracker.track_sta(&station, channel)
    }

    pub fn stop_tracking(&self) -> bool {
        self.tracker.stop_tracking()
    }

    pub fn latest_track_reading(&self) -> Option<TrackReading> {
        self.tracker.latest()
    }

    /// Stop every running attack, hopper and sniffer.
    pub fn stop_all(&self) {
        self.attacks.stop_all();
        self.stop_sae_flood();
        self.stop_karma();
        self.stop_tracking();
        self.stop_monitor_mode();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn out_of_range(index: usize, count: usize) -> EngineError {
    EngineError::invalid_target(format!(
        "Invalid AP index {index}, {count} access points scanned"
    ))
}
