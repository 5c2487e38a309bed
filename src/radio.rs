//! Monitor mode radio on Linux.
//!
//! Frames go out through an AF_PACKET socket with a radiotap header that
//! asks the driver not to wait for ACKs. Receive runs on its own thread and
//! hands stripped 802.11 frames to the promiscuous callback. There is no
//! SoftAP on a monitor interface, so the SoftAP calls report
//! [DriverError::Unsupported] and SoftAP frames are injected like any other.

use std::collections::HashMap;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use libwifi::frame::components::{MacAddress, StationInfo};
use libwifi::{parse_frame, Frame};
use log::{debug, info, warn};
use nl80211_ng::{get_interface_info_idx, set_interface_chan};
use radiotap::Radiotap;

use crate::devices::{AccessPoint, AuthMode};
use crate::hopper::live_ap_channels;
use crate::interface::{
    DriverError, FrameCallback, PacketFilter, RadioDriver, RadioInterface, RxFrame, ScanConfig,
    SecondaryChannel, SoftApConfig, WifiMode,
};
use crate::rawsocks::{open_socket_rx, open_socket_tx, read_packet, write_packet};
use crate::task::{CancelToken, Worker, STOP_GRACE};

const RTH_NO_ACK: [u8; 10] = [
    0x00, 0x00, /* radiotap version and padding */
    0x0a, 0x00, /* radiotap header length */
    0x00, 0x80, 0x00, 0x00, /* bitmap */
    0x28, 0x00, /* tx flags */
];

/// Capability bit 4.
const CAPABILITY_PRIVACY: u16 = 0x0010;

const RX_IDLE: Duration = Duration::from_millis(1);

pub fn frequency_to_channel(freq: u16) -> Option<u8> {
    match freq {
        2484 => Some(14),
        2412..=2472 => Some(((freq - 2407) / 5) as u8),
        5000..=5900 => Some(((freq - 5000) / 5) as u8),
        _ => None,
    }
}

/// One frame off the RX socket with its radiotap header stripped.
fn decode_rx(packet: &[u8], fallback_channel: u8) -> Option<RxFrame> {
    let radiotap = Radiotap::from_bytes(packet).ok()?;
    let mut payload = packet.get(radiotap.header.length..)?.to_vec();
    if radiotap.flags.map(|flags| flags.fcs).unwrap_or(false) {
        payload.truncate(payload.len().saturating_sub(4));
    }

    Some(RxFrame {
        payload,
        rssi: radiotap.antenna_signal.map(|s| s.value).unwrap_or(0),
        channel: radiotap
            .channel
            .and_then(|channel| frequency_to_channel(channel.freq))
            .unwrap_or(fallback_channel),
    })
}

fn access_point_from(
    bssid: MacAddress,
    info: &StationInfo,
    capability_info: u16,
    rx: &RxFrame,
) -> AccessPoint {
    AccessPoint::new(
        bssid,
        info.visible_ssid().unwrap_or_default(),
        info.ds_parameter_set.unwrap_or(rx.channel),
        rx.rssi,
    )
    .with_auth_mode(AuthMode::from_station_info(
        info,
        capability_info & CAPABILITY_PRIVACY != 0,
    ))
}

pub struct MonitorRadio {
    ifindex: i32,
    mac: MacAddress,
    tx_socket: OwnedFd,
    rx_socket: Arc<OwnedFd>,
    channel: Arc<AtomicU8>,
    mode: Mutex<WifiMode>,
    receiver: Mutex<Option<Worker>>,
    scan_results: Mutex<Vec<AccessPoint>>,
}

impl MonitorRadio {
    /// Open the monitor interface at `ifindex`. The interface must already
    /// be in monitor mode.
    pub fn open(ifindex: i32) -> Result<MonitorRadio, DriverError> {
        let interface = get_interface_info_idx(ifindex)
            .map_err(|e| DriverError::NotReady(e.to_string()))?;
        let mac = interface
            .mac
            .and_then(MacAddress::from_vec)
            .ok_or_else(|| DriverError::NotReady("interface has no MAC address".to_string()))?;

        let tx_socket = open_socket_tx(ifindex)?;
        let rx_socket = open_socket_rx(ifindex)?;
        info!("Opened monitor interface {ifindex} ({mac})");

        Ok(MonitorRadio {
            ifindex,
            mac,
            tx_socket,
            rx_socket: Arc::new(rx_socket),
            channel: Arc::new(AtomicU8::new(1)),
            mode: Mutex::new(WifiMode::Station),
            receiver: Mutex::new(None),
            scan_results: Mutex::new(Vec::new()),
        })
    }

    fn stop_receiver(&self) {
        let receiver = self.receiver.lock().ok().and_then(|mut rx| rx.take());
        if let Some(receiver) = receiver {
            receiver.stop(STOP_GRACE);
        }
    }

    /// Collect beacons and probe responses on `channel` for `dwell`.
    fn listen(&self, channel: u8, dwell: Duration, seen: &mut HashMap<MacAddress, AccessPoint>) {
        let deadline = Instant::now() + dwell;
        while Instant::now() < deadline {
            let packet = match read_packet(&self.rx_socket) {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    std::thread::sleep(RX_IDLE);
                    continue;
                }
                Err(e) => {
                    warn!("Scan read failed: {e}");
                    return;
                }
            };
            let Some(rx) = decode_rx(&packet, channel) else {
                continue;
            };
            let ap = match parse_frame(&rx.payload, false) {
                Ok(Frame::Beacon(beacon)) => access_point_from(
                    beacon.header.address_3,
                    &beacon.station_info,
                    beacon.capability_info,
                    &rx,
                ),
                Ok(Frame::ProbeResponse(response)) => access_point_from(
                    response.header.address_3,
                    &response.station_info,
                    response.capability_info,
                    &rx,
                ),
                _ => continue,
            };
            if !ap.bssid.is_real_device() {
                continue;
            }

            seen.entry(ap.bssid)
                .and_modify(|known| {
                    known.rssi = known.rssi.max(ap.rssi);
                    if known.is_hidden() && !ap.is_hidden() {
                        known.ssid = ap.ssid.clone();
                    }
                })
                .or_insert(ap);
        }
    }
}

impl RadioDriver for MonitorRadio {
    fn set_channel(&self, primary: u8, secondary: SecondaryChannel) -> Result<(), DriverError> {
        if secondary != SecondaryChannel::None {
            debug!("Secondary channel {secondary} ignored, monitor runs HT20");
        }
        set_interface_chan(self.ifindex, primary)
            .map_err(|e| DriverError::Io(e.to_string()))?;
        self.channel.store(primary, Ordering::SeqCst);
        Ok(())
    }

    fn channel(&self) -> Result<u8, DriverError> {
        Ok(self.channel.load(Ordering::SeqCst))
    }

    fn transmit_raw_frame(&self, _iface: RadioInterface, frame: &[u8]) -> Result<(), DriverError> {
        let mut packet = Vec::with_capacity(RTH_NO_ACK.len() + frame.len());
        packet.extend_from_slice(&RTH_NO_ACK);
        packet.extend_from_slice(frame);
        write_packet(&self.tx_socket, &packet)
    }

    fn set_promiscuous(
        &self,
        enabled: bool,
        filter: PacketFilter,
        callback: Option<FrameCallback>,
    ) -> Result<(), DriverError> {
        self.stop_receiver();
        let Some(callback) = callback.filter(|_| enabled) else {
            return Ok(());
        };

        let socket = self.rx_socket.clone();
        let channel = self.channel.clone();
        let worker = Worker::spawn("radio-rx", move |token: CancelToken| {
            while !token.is_cancelled() {
                let packet = match read_packet(&socket) {
                    Ok(Some(packet)) => packet,
                    Ok(None) => {
                        token.sleep(RX_IDLE);
                        continue;
                    }
                    Err(e) => {
                        warn!("Receive failed: {e}");
                        token.sleep(RX_IDLE);
                        continue;
                    }
                };
                let Some(rx) = decode_rx(&packet, channel.load(Ordering::Relaxed)) else {
                    continue;
                };
                let Some(first) = rx.payload.first() else {
                    continue;
                };
                if filter.contains(PacketFilter::for_frame_type((first >> 2) & 0b11)) {
                    callback(&rx);
                }
            }
        })
        .map_err(|e| DriverError::Io(e.to_string()))?;

        if let Ok(mut receiver) = self.receiver.lock() {
            *receiver = Some(worker);
        }
        Ok(())
    }

    fn mode(&self) -> Result<WifiMode, DriverError> {
        self.mode
            .lock()
            .map(|mode| *mode)
            .map_err(|_| DriverError::NotReady("mode lock poisoned".to_string()))
    }

    fn set_mode(&self, mode: WifiMode) -> Result<(), DriverError> {
        if matches!(mode, WifiMode::SoftAp | WifiMode::StationSoftAp) {
            return Err(DriverError::Unsupported("soft AP on a monitor interface"));
        }
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
        Ok(())
    }

    fn start(&self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Passive scan: dwell on each channel listening for beacons until the
    /// channel list or the timeout runs out.
    fn scan(&self, config: &ScanConfig) -> Result<(), DriverError> {
        let started = Instant::now();
        let mut seen: HashMap<MacAddress, AccessPoint> = HashMap::new();

        for channel in live_ap_channels() {
            if started.elapsed() >= config.timeout {
                break;
            }
            if let Err(e) = self.set_channel(channel, SecondaryChannel::None) {
                debug!("Skipping channel {channel}: {e}");
                continue;
            }
            self.listen(channel, config.passive, &mut seen);
        }

        let mut results: Vec<AccessPoint> = seen
            .into_values()
            .filter(|ap| config.show_hidden || !ap.is_hidden())
            .collect();
        results.sort_by(|a, b| b.rssi.cmp(&a.rssi));

        if let Ok(mut scan_results) = self.scan_results.lock() {
            *scan_results = results;
        }
        Ok(())
    }

    fn scan_result_count(&self) -> Result<usize, DriverError> {
        self.scan_results
            .lock()
            .map(|results| results.len())
            .map_err(|_| DriverError::NotReady("scan results lock poisoned".to_string()))
    }

    fn scan_results(&self, out: &mut Vec<AccessPoint>, max: usize) -> Result<(), DriverError> {
        let results = self
            .scan_results
            .lock()
            .map_err(|_| DriverError::NotReady("scan results lock poisoned".to_string()))?;
        out.extend(results.iter().take(max).cloned());
        Ok(())
    }

    fn mac_address(&self, _iface: RadioInterface) -> Result<MacAddress, DriverError> {
        Ok(self.mac)
    }

    fn set_ap_config(&self, _config: &SoftApConfig) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("soft AP on a monitor interface"))
    }

    fn ap_client_has_ip(&self) -> bool {
        false
    }
}

impl Drop for MonitorRadio {
    fn drop(&mut self) {
        self.stop_receiver();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_to_channel() {
        assert_eq!(frequency_to_channel(2412), Some(1));
        assert_eq!(frequency_to_channel(2462), Some(11));
        assert_eq!(frequency_to_channel(2484), Some(14));
        assert_eq!(frequency_to_channel(5180), Some(36));
        assert_eq!(frequency_to_channel(5825), Some(165));
        assert_eq!(frequency_to_channel(900), None);
    }

    #[test]
    fn test_decode_strips_radiotap() {
        let mut packet = RTH_NO_ACK.to_vec();
        packet.extend_from_slice(&[0x80, 0x00, 0x00, 0x00]);
        let rx = decode_rx(&packet, 6).expect("valid radiotap");
        assert_eq!(rx.payload, vec![0x80, 0x00, 0x00, 0x00]);
        assert_eq!(rx.channel, 6);
    }
}
