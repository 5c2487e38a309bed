#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use libwifi::frame::components::MacAddress;
use wifi_oxide::devices::{AccessPoint, AuthMode};
use wifi_oxide::interface::{
    Collaborators, DriverError, FrameCallback, PacketFilter, PortalService, RadioDriver,
    RadioInterface, RxFrame, ScanConfig, SecondaryChannel, SettingsStore, SoftApConfig,
    StatusDisplay, VendorLookup, WifiMode,
};
use wifi_oxide::{Engine, EngineConfig};

/// A frame handed to the mock radio.
#[derive(Clone, Debug)]
pub struct SentFrame {
    pub iface: RadioInterface,
    pub channel: u8,
    pub bytes: Vec<u8>,
    pub at: Instant,
}

impl SentFrame {
    pub fn subtype(&self) -> u8 {
        self.bytes[0] >> 4
    }

    pub fn addr(&self, n: usize) -> MacAddress {
        let start = 4 + (n - 1) * 6;
        MacAddress::from_slice(&self.bytes[start..start + 6]).expect("six bytes")
    }
}

pub const SUBTYPE_PROBE_RESPONSE: u8 = 5;
pub const SUBTYPE_BEACON: u8 = 8;
pub const SUBTYPE_DISASSOC: u8 = 10;
pub const SUBTYPE_AUTH: u8 = 11;
pub const SUBTYPE_DEAUTH: u8 = 12;

/// Radio that records everything and injects what the test tells it to.
pub struct MockRadio {
    mac: MacAddress,
    channel: AtomicU8,
    mode: Mutex<WifiMode>,
    frames: Mutex<Vec<SentFrame>>,
    channel_sets: Mutex<Vec<u8>>,
    callback: Mutex<Option<(PacketFilter, FrameCallback)>>,
    scan_aps: Mutex<Vec<AccessPoint>>,
    reported_count: Mutex<Option<usize>>,
    queue_full: AtomicUsize,
    ap_configs: Mutex<Vec<SoftApConfig>>,
    client_has_ip: AtomicBool,
    pub scans: AtomicUsize,
}

impl MockRadio {
    pub fn new() -> Arc<MockRadio> {
        Arc::new(MockRadio {
            mac: MacAddress([0x24, 0x0a, 0xc4, 0x11, 0x22, 0x33]),
            channel: AtomicU8::new(1),
            mode: Mutex::new(WifiMode::Null),
            frames: Mutex::new(Vec::new()),
            channel_sets: Mutex::new(Vec::new()),
            callback: Mutex::new(None),
            scan_aps: Mutex::new(Vec::new()),
            reported_count: Mutex::new(None),
            queue_full: AtomicUsize::new(0),
            ap_configs: Mutex::new(Vec::new()),
            client_has_ip: AtomicBool::new(false),
            scans: AtomicUsize::new(0),
        })
    }

    pub fn set_scan_results(&self, aps: Vec<AccessPoint>) {
        *self.scan_aps.lock().unwrap() = aps;
    }

    /// Make `scan_result_count` report `count` regardless of the stored APs.
    pub fn report_count(&self, count: usize) {
        *self.reported_count.lock().unwrap() = Some(count);
    }

    /// Fail the next `n` transmits with a full queue.
    pub fn fail_next(&self, n: usize) {
        self.queue_full.store(n, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<SentFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn clear_frames(&self) {
        self.frames.lock().unwrap().clear();
    }

    pub fn channel_sets(&self) -> Vec<u8> {
        self.channel_sets.lock().unwrap().clone()
    }

    pub fn ap_configs(&self) -> Vec<SoftApConfig> {
        self.ap_configs.lock().unwrap().clone()
    }

    pub fn set_client_has_ip(&self, connected: bool) {
        self.client_has_ip.store(connected, Ordering::SeqCst);
    }

    pub fn promiscuous(&self) -> bool {
        self.callback.lock().unwrap().is_some()
    }

    /// Deliver `payload` to the promiscuous callback, if its filter allows.
    pub fn inject(&self, payload: Vec<u8>, rssi: i8) -> bool {
        let installed = self.callback.lock().unwrap().clone();
        let Some((filter, callback)) = installed else {
            return false;
        };
        if !filter.contains(PacketFilter::for_frame_type((payload[0] >> 2) & 0b11)) {
            return false;
        }
        callback(&RxFrame {
            payload,
            rssi,
            channel: self.channel.load(Ordering::SeqCst),
        });
        true
    }
}

impl RadioDriver for MockRadio {
    fn set_channel(&self, primary: u8, _secondary: SecondaryChannel) -> Result<(), DriverError> {
        self.channel.store(primary, Ordering::SeqCst);
        self.channel_sets.lock().unwrap().push(primary);
        Ok(())
    }

    fn channel(&self) -> Result<u8, DriverError> {
        Ok(self.channel.load(Ordering::SeqCst))
    }

    fn transmit_raw_frame(&self, iface: RadioInterface, frame: &[u8]) -> Result<(), DriverError> {
        let failing = self
            .queue_full
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DriverError::QueueFull);
        }
        self.frames.lock().unwrap().push(SentFrame {
            iface,
            channel: self.channel.load(Ordering::SeqCst),
            bytes: frame.to_vec(),
            at: Instant::now(),
        });
        Ok(())
    }

    fn set_promiscuous(
        &self,
        enabled: bool,
        filter: PacketFilter,
        callback: Option<FrameCallback>,
    ) -> Result<(), DriverError> {
        let mut installed = self.callback.lock().unwrap();
        *installed = match (enabled, callback) {
            (true, Some(callback)) => Some((filter, callback)),
            _ => None,
        };
        Ok(())
    }

    fn mode(&self) -> Result<WifiMode, DriverError> {
        Ok(*self.mode.lock().unwrap())
    }

    fn set_mode(&self, mode: WifiMode) -> Result<(), DriverError> {
        *self.mode.lock().unwrap() = mode;
        Ok(())
    }

    fn start(&self) -> Result<(), DriverError> {
        Ok(())
    }

    fn scan(&self, _config: &ScanConfig) -> Result<(), DriverError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn scan_result_count(&self) -> Result<usize, DriverError> {
        let reported = *self.reported_count.lock().unwrap();
        Ok(reported.unwrap_or_else(|| self.scan_aps.lock().unwrap().len()))
    }

    fn scan_results(&self, out: &mut Vec<AccessPoint>, max: usize) -> Result<(), DriverError> {
        out.extend(self.scan_aps.lock().unwrap().iter().take(max).cloned());
        Ok(())
    }

    fn mac_address(&self, _iface: RadioInterface) -> Result<MacAddress, DriverError> {
        Ok(self.mac)
    }

    fn set_ap_config(&self, config: &SoftApConfig) -> Result<(), DriverError> {
        self.ap_configs.lock().unwrap().push(config.clone());
        Ok(())
    }

    fn ap_client_has_ip(&self) -> bool {
        self.client_has_ip.load(Ordering::SeqCst)
    }
}

pub struct NoVendors;

impl VendorLookup for NoVendors {
    fn lookup_vendor(&self, _mac: &str) -> Option<String> {
        None
    }
}

#[derive(Default)]
pub struct MockPortal {
    pub starts: Mutex<Vec<(String, String, String, String, String)>>,
    pub stops: AtomicUsize,
    active: AtomicBool,
}

impl PortalService for MockPortal {
    fn start_portal(
        &self,
        content_ref: &str,
        ssid: &str,
        password: &str,
        ap_ssid: &str,
        domain: &str,
    ) -> Result<(), DriverError> {
        self.starts.lock().unwrap().push((
            content_ref.to_string(),
            ssid.to_string(),
            password.to_string(),
            ap_ssid.to_string(),
            domain.to_string(),
        ));
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_portal(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

pub struct TestSettings;

impl SettingsStore for TestSettings {
    fn broadcast_speed(&self) -> Duration {
        Duration::from_millis(5)
    }

    fn wifi_country(&self) -> String {
        "US".to_string()
    }

    fn station_credentials(&self) -> Option<(String, String)> {
        None
    }
}

#[derive(Default)]
pub struct RecordingDisplay {
    pub attacks: Mutex<Vec<(String, String)>>,
    pub statuses: Mutex<Vec<String>>,
}

impl RecordingDisplay {
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn attacks(&self) -> Vec<(String, String)> {
        self.attacks.lock().unwrap().clone()
    }
}

impl StatusDisplay for RecordingDisplay {
    fn show_attack(&self, name: &str, target: &str) {
        self.attacks
            .lock()
            .unwrap()
            .push((name.to_string(), target.to_string()));
    }

    fn show_status(&self, line: &str) {
        self.statuses.lock().unwrap().push(line.to_string());
    }
}

pub struct Harness {
    pub engine: Engine,
    pub radio: Arc<MockRadio>,
    pub portal: Arc<MockPortal>,
    pub display: Arc<RecordingDisplay>,
}

/// Short timings so attack loops turn over quickly.
pub fn fast_config() -> EngineConfig {
    EngineConfig::default()
        .deauth_interval(Duration::from_millis(10))
        .karma_rotate_interval(Duration::from_millis(100))
        .sae_stats_interval(Duration::from_millis(200))
}

pub fn collaborators_for(
    radio: &Arc<MockRadio>,
    portal: &Arc<MockPortal>,
    display: &Arc<RecordingDisplay>,
) -> Collaborators {
    Collaborators {
        radio: radio.clone(),
        vendors: Arc::new(NoVendors),
        portal: portal.clone(),
        settings: Arc::new(TestSettings),
        display: display.clone(),
    }
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let radio = MockRadio::new();
    let portal = Arc::new(MockPortal::default());
    let display = Arc::new(RecordingDisplay::default());
    let collaborators = collaborators_for(&radio, &portal, &display);
    Harness {
        engine: Engine::new(collaborators, config),
        radio,
        portal,
        display,
    }
}

pub fn harness() -> Harness {
    harness_with(fast_config())
}

pub fn bssid(n: u8) -> MacAddress {
    MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, n])
}

pub fn station_mac(n: u8) -> MacAddress {
    MacAddress([0x5c, 0x51, 0x4f, 0x00, 0x00, n])
}

pub fn ap(n: u8, ssid: &str, channel: u8) -> AccessPoint {
    AccessPoint::new(bssid(n), ssid, channel, -50).with_auth_mode(AuthMode::Wpa2Psk)
}

/// Five APs spread over channels 1, 6, 11 and 36.
pub fn five_aps() -> Vec<AccessPoint> {
    vec![
        ap(0, "home", 1),
        ap(1, "office", 6),
        ap(2, "cafe", 11),
        ap(3, "office", 36),
        ap(4, "lab", 6),
    ]
}

/// Scan the given APs into `harness`.
pub fn scan_in(harness: &Harness, aps: Vec<AccessPoint>) {
    harness.radio.set_scan_results(aps);
    harness
        .engine
        .start_scan(Duration::from_millis(10))
        .expect("scan starts");
    harness.engine.stop_scan().expect("scan stops");
}

/// Bare 24 byte management header.
pub fn mgmt_frame(subtype: u8, a1: MacAddress, a2: MacAddress, a3: MacAddress) -> Vec<u8> {
    let mut frame = vec![subtype << 4, 0x00, 0x00, 0x00];
    frame.extend_from_slice(&a1.0);
    frame.extend_from_slice(&a2.0);
    frame.extend_from_slice(&a3.0);
    frame.extend_from_slice(&[0x10, 0x00]);
    frame
}

pub fn probe_request(source: MacAddress, ssid: &str) -> Vec<u8> {
    let mut frame = mgmt_frame(4, MacAddress::broadcast(), source, MacAddress::broadcast());
    frame.push(0);
    frame.push(ssid.len() as u8);
    frame.extend_from_slice(ssid.as_bytes());
    frame.extend_from_slice(&[0x01, 0x04, 0x02, 0x04, 0x0b, 0x16]);
    frame
}

/// SAE commit answer from `ap` to `sta` with `status`. Status 76 carries
/// `token` after the group.
pub fn sae_response(ap: MacAddress, sta: MacAddress, status: u16, token: &[u8]) -> Vec<u8> {
    let mut frame = mgmt_frame(SUBTYPE_AUTH, sta, ap, ap);
    frame.extend_from_slice(&3u16.to_le_bytes());
    frame.extend_from_slice(&1u16.to_le_bytes());
    frame.extend_from_slice(&status.to_le_bytes());
    frame.extend_from_slice(&19u16.to_le_bytes());
    frame.extend_from_slice(token);
    frame
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
