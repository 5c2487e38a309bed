//! Seams between the engine and the outside world.
//!
//! The engine never talks to hardware, UI or storage directly. It consumes
//! the collaborator traits below; the binary wires in Linux implementations
//! and the tests wire in recording mocks.

use std::sync::Arc;
use std::time::Duration;

use derive_setters::Setters;
use libwifi::frame::components::MacAddress;
use strum_macros::Display;
use thiserror::Error;

use crate::devices::AccessPoint;

/// Errors reported by a [RadioDriver].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("radio not ready: {0}")]
    NotReady(String),
    /// The transmit queue is full. Callers back off and retry.
    #[error("transmit queue full")]
    QueueFull,
    #[error("operation not supported by this radio: {0}")]
    Unsupported(&'static str),
    #[error("{0}")]
    Io(String),
}

/// HT40 secondary channel placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum SecondaryChannel {
    None,
    Above,
    Below,
}

/// Which virtual interface a raw frame leaves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum RadioInterface {
    Station,
    SoftAp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum WifiMode {
    Null,
    Station,
    SoftAp,
    StationSoftAp,
}

/// Frame types delivered to a promiscuous callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketFilter(u8);

impl PacketFilter {
    pub const MGMT: PacketFilter = PacketFilter(0b001);
    pub const CTRL: PacketFilter = PacketFilter(0b010);
    pub const DATA: PacketFilter = PacketFilter(0b100);
    pub const ALL: PacketFilter = PacketFilter(0b111);

    pub fn contains(&self, other: PacketFilter) -> bool {
        self.0 & other.0 == other.0
    }

    /// Filter bit for the two bit 802.11 frame type.
    pub fn for_frame_type(frame_type: u8) -> PacketFilter {
        match frame_type {
            0 => PacketFilter::MGMT,
            1 => PacketFilter::CTRL,
            _ => PacketFilter::DATA,
        }
    }
}

impl std::ops::BitOr for PacketFilter {
    type Output = PacketFilter;

    fn bitor(self, rhs: PacketFilter) -> PacketFilter {
        PacketFilter(self.0 | rhs.0)
    }
}

/// A received 802.11 frame. `payload` starts at the frame control field and
/// carries no FCS.
#[derive(Clone, Debug)]
pub struct RxFrame {
    pub payload: Vec<u8>,
    pub rssi: i8,
    pub channel: u8,
}

/// Promiscuous receive callback. Runs on the driver's receive context, so it
/// must return quickly.
pub type FrameCallback = Arc<dyn Fn(&RxFrame) + Send + Sync>;

/// Parameters for a blocking AP scan.
#[derive(Clone, Debug, Setters)]
pub struct ScanConfig {
    pub active_min: Duration,
    pub active_max: Duration,
    pub passive: Duration,
    pub show_hidden: bool,
    /// Upper bound for the whole scan.
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            active_min: Duration::from_millis(450),
            active_max: Duration::from_millis(500),
            passive: Duration::from_millis(500),
            show_hidden: true,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Clone, Debug, Setters, PartialEq, Eq)]
#[setters(into)]
pub struct SoftApConfig {
    pub ssid: String,
    pub password: String,
    pub channel: u8,
    pub max_connections: u8,
}

impl Default for SoftApConfig {
    fn default() -> Self {
        SoftApConfig {
            ssid: String::new(),
            password: String::new(),
            channel: 1,
            max_connections: 4,
        }
    }
}

/// The vendor WiFi stack.
pub trait RadioDriver: Send + Sync {
    fn set_channel(&self, primary: u8, secondary: SecondaryChannel) -> Result<(), DriverError>;

    fn channel(&self) -> Result<u8, DriverError>;

    /// Inject a raw 802.11 frame starting at the frame control field.
    fn transmit_raw_frame(&self, iface: RadioInterface, frame: &[u8]) -> Result<(), DriverError>;

    /// Enable or disable promiscuous receive. Enabling replaces any
    /// previously installed callback.
    fn set_promiscuous(
        &self,
        enabled: bool,
        filter: PacketFilter,
        callback: Option<FrameCallback>,
    ) -> Result<(), DriverError>;

    fn mode(&self) -> Result<WifiMode, DriverError>;

    fn set_mode(&self, mode: WifiMode) -> Result<(), DriverError>;

    /// Bring the radio up in the configured mode.
    fn start(&self) -> Result<(), DriverError>;

    /// Run a blocking AP scan. Results are fetched afterwards.
    fn scan(&self, config: &ScanConfig) -> Result<(), DriverError>;

    /// Number of records the last scan produced.
    fn scan_result_count(&self) -> Result<usize, DriverError>;

    /// Append up to `max` records of the last scan to `out`.
    fn scan_results(&self, out: &mut Vec<AccessPoint>, max: usize) -> Result<(), DriverError>;

    fn mac_address(&self, iface: RadioInterface) -> Result<MacAddress, DriverError>;

    fn set_ap_config(&self, config: &SoftApConfig) -> Result<(), DriverError>;

    /// Whether a client of the SoftAP holds a DHCP lease.
    fn ap_client_has_ip(&self) -> bool;
}

/// OUI database.
pub trait VendorLookup: Send + Sync {
    fn lookup_vendor(&self, mac: &str) -> Option<String>;
}

/// Captive portal web server.
pub trait PortalService: Send + Sync {
    fn start_portal(
        &self,
        content_ref: &str,
        ssid: &str,
        password: &str,
        ap_ssid: &str,
        domain: &str,
    ) -> Result<(), DriverError>;

    fn stop_portal(&self);

    fn is_active(&self) -> bool;
}

/// Persisted user settings.
pub trait SettingsStore: Send + Sync {
    /// Pause between beacon rounds.
    fn broadcast_speed(&self) -> Duration;

    /// ISO 3166 alpha-2 country code.
    fn wifi_country(&self) -> String;

    /// SSID and password of the network the device joins in station mode.
    fn station_credentials(&self) -> Option<(String, String)>;
}

/// Fire-and-forget status sink.
pub trait StatusDisplay: Send + Sync {
    fn show_attack(&self, name: &str, target: &str);

    fn show_status(&self, line: &str);
}

/// The collaborators an [Engine](crate::engine::Engine) is built from.
#[derive(Clone)]
pub struct Collaborators {
    pub radio: Arc<dyn RadioDriver>,
    pub vendors: Arc<dyn VendorLookup>,
    pub portal: Arc<dyn PortalService>,
    pub settings: Arc<dyn SettingsStore>,
    pub display: Arc<dyn StatusDisplay>,
}

impl Collaborators {
    /// Vendor name for logging, "Unknown" when the lookup has no answer.
    pub fn vendor_or_unknown(&self, mac: &MacAddress) -> String {
        self.vendors
            .lookup_vendor(&mac.to_long_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}
