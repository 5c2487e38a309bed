use std::sync::{Arc, Mutex};

use libwifi::frame::components::MacAddress;
use libwifi::parsers::{parse_frame_control, parse_management_header};
use libwifi::FrameType;
use log::info;

use crate::devices::{AccessPoint, Station};
use crate::interface::Collaborators;
use crate::scan::ScanResultSet;

/// Stations beyond this are ignored until the list is cleared.
pub const MAX_STATIONS: usize = 50;

/// Pull the station address out of a frame exchanged with `bssid`.
///
/// Returns `None` when the frame does not involve `bssid` at all, and
/// `Some(None)` when it does but no usable station address is present.
fn candidate_for(
    bssid: &MacAddress,
    addr1: &MacAddress,
    addr2: &MacAddress,
    addr3: &MacAddress,
) -> Option<Option<MacAddress>> {
    let usable = |mac: &MacAddress| !mac.is_mcast() && !mac.is_zero();

    if addr1 == bssid && addr2 != bssid {
        Some(Some(*addr2))
    } else if addr2 == bssid && addr1 != bssid {
        Some(Some(*addr1))
    } else if addr3 == bssid {
        if usable(addr2) && addr2 != bssid {
            Some(Some(*addr2))
        } else if usable(addr1) && addr1 != bssid {
            Some(Some(*addr1))
        } else {
            Some(None)
        }
    } else {
        None
    }
}

/// Discovers stations by watching traffic to and from scanned APs.
///
/// The first AP, in scan order, whose address matches the frame decides the
/// result. This is an approximation: a frame between two known APs is
/// attributed to whichever was scanned first, and then usually rejected
/// because the candidate is itself a BSSID.
pub struct StationCorrelator {
    collaborators: Collaborators,
    known_aps: Mutex<ScanResultSet>,
    stations: Mutex<Vec<Station>>,
}

impl StationCorrelator {
    pub fn new(collaborators: Collaborators) -> Self {
        StationCorrelator {
            collaborators,
            known_aps: Mutex::new(Arc::new(Vec::new())),
            stations: Mutex::new(Vec::new()),
        }
    }

    /// Correlate against `aps` from now on.
    pub fn set_known_aps(&self, aps: ScanResultSet) {
        if let Ok(mut known) = self.known_aps.lock() {
            *known = aps;
        }
    }

    /// Inspect one raw frame. Returns the station if it is new. Only
    /// management frames are considered.
    pub fn on_frame(&self, frame: &[u8]) -> Option<Station> {
        let (rest, frame_control) = parse_frame_control(frame).ok()?;
        if frame_control.frame_type != FrameType::Management {
            return None;
        }
        let (_, header) = parse_management_header(frame_control, rest).ok()?;

        let aps = self.known_aps.lock().ok()?.clone();
        let (ap, mac) = aps.iter().find_map(|ap| {
            candidate_for(
                &ap.bssid,
                &header.address_1,
                &header.address_2,
                &header.address_3,
            )
            .map(|candidate| (ap, candidate))
        })?;
        let mac = mac?;

        if mac.is_mcast() || mac.is_zero() || aps.iter().any(|known| known.bssid == mac) {
            return None;
        }

        self.record(ap, mac)
    }

    fn record(&self, ap: &AccessPoint, mac: MacAddress) -> Option<Station> {
        let mut stations = self.stations.lock().ok()?;
        if stations.len() >= MAX_STATIONS || stations.iter().any(|s| s.mac == mac) {
            return None;
        }

        let station = Station {
            mac,
            bssid: ap.bssid,
        };
        stations.push(station);
        drop(stations);

        info!(
            "New Station {} ({}) on {} ({}) [{}]",
            mac,
            self.collaborators.vendor_or_unknown(&mac),
            ap.display_ssid(),
            ap.bssid,
            self.collaborators.vendor_or_unknown(&ap.bssid),
        );
        Some(station)
    }

    pub fn stations(&self) -> Vec<Station> {
        self.stations
            .lock()
            .map(|stations| stations.clone())
            .unwrap_or_default()
    }

    pub fn stations_for(&self, bssid: &MacAddress) -> Vec<Station> {
        self.stations()
            .into_iter()
            .filter(|station| &station.bssid == bssid)
            .collect()
    }

    /// Station at `index` in discovery order.
    pub fn get(&self, index: usize) -> Option<Station> {
        self.stations.lock().ok()?.get(index).copied()
    }

    pub fn clear(&self) {
        if let Ok(mut stations) = self.stations.lock() {
            stations.clear();
        }
    }
}
