use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use libwifi::frame::components::{
    FrameControl, MacAddress, ManagementHeader, SequenceControl, StationInfo, VendorSpecificInfo,
};
use libwifi::frame::{
    Authentication, Beacon, DeauthenticationReason, Deauthentication, Disassociation,
    ProbeResponse, SaeCommit, AUTH_ALGORITHM_SAE,
};
use libwifi::FrameSubType;

use crate::interface::{DriverError, RadioDriver, RadioInterface};

/// Hard ceiling on injected frames in any rolling one second window.
pub const MAX_PACKETS_PER_SECOND: usize = 500;

/// 1, 2, 5.5 and 11 Mbit/s as basic rates, then 18, 24, 36 and 54.
pub const RATES: [u8; 8] = [0x82, 0x84, 0x8b, 0x96, 0x24, 0x30, 0x48, 0x6c];

/// Capability bits: ESS, short preamble, short slot time.
pub const CAPABILITY_INFO: u16 = 0x0411;

/// 100 TU, the usual beacon interval.
pub const BEACON_INTERVAL: u16 = 100;

const DEAUTH_DURATION: [u8; 2] = [0x3a, 0x01];

/// Wi-Fi Alliance vendor element advertised by spoofed beacons.
const WFA_VENDOR_OUI: [u8; 3] = [0x50, 0x6f, 0x9a];

/// Result of a transmit attempt that reached the limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxOutcome {
    Sent,
    RateLimited,
}

/// Sliding window limiter shared by every injection path.
pub struct FrameRateLimiter {
    sent: Mutex<VecDeque<Instant>>,
    limit: usize,
    window: Duration,
}

impl FrameRateLimiter {
    pub fn new(limit: usize) -> Self {
        FrameRateLimiter {
            sent: Mutex::new(VecDeque::with_capacity(limit)),
            limit,
            window: Duration::from_secs(1),
        }
    }

    /// Reserve a slot in the current window.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let Ok(mut sent) = self.sent.lock() else {
            return false;
        };
        while sent
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= self.window)
        {
            sent.pop_front();
        }
        if sent.len() >= self.limit {
            return false;
        }
        sent.push_back(now);
        true
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Rate limited gateway to [RadioDriver::transmit_raw_frame].
pub struct FrameInjector {
    radio: Arc<dyn RadioDriver>,
    limiter: FrameRateLimiter,
    sent: AtomicU64,
    limited: AtomicU64,
}

impl FrameInjector {
    pub fn new(radio: Arc<dyn RadioDriver>, limit: usize) -> Self {
        FrameInjector {
            radio,
            limiter: FrameRateLimiter::new(limit),
            sent: AtomicU64::new(0),
            limited: AtomicU64::new(0),
        }
    }

    pub fn radio(&self) -> &Arc<dyn RadioDriver> {
        &self.radio
    }

    /// Transmit on the station interface.
    pub fn transmit(&self, frame: &[u8]) -> Result<TxOutcome, DriverError> {
        self.transmit_on(RadioInterface::Station, frame)
    }

    pub fn transmit_on(
        &self,
        iface: RadioInterface,
        frame: &[u8],
    ) -> Result<TxOutcome, DriverError> {
        if !self.limiter.try_acquire() {
            self.limited.fetch_add(1, Ordering::Relaxed);
            return Ok(TxOutcome::RateLimited);
        }
        self.radio.transmit_raw_frame(iface, frame)?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(TxOutcome::Sent)
    }

    /// Frames sent since the injector was created.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Frames dropped by the limiter since the injector was created.
    pub fn rate_limited(&self) -> u64 {
        self.limited.load(Ordering::Relaxed)
    }
}

fn management_header(
    subtype: FrameSubType,
    duration: [u8; 2],
    address_1: MacAddress,
    address_2: MacAddress,
    address_3: MacAddress,
) -> ManagementHeader {
    ManagementHeader {
        frame_control: FrameControl::management(subtype),
        duration,
        address_1,
        address_2,
        address_3,
        sequence_control: SequenceControl::random(),
    }
}

/// Deauthentication from the AP to `target`, which may be broadcast.
pub fn build_deauth_frame(
    bssid: &MacAddress,
    target: &MacAddress,
    reason: DeauthenticationReason,
) -> Vec<u8> {
    Deauthentication {
        header: management_header(
            FrameSubType::Deauthentication,
            DEAUTH_DURATION,
            *target,
            *bssid,
            *bssid,
        ),
        reason_code: reason,
    }
    .encode()
}

/// Deauthentication spoofed from `station` to its AP.
pub fn build_deauth_frame_from_station(
    bssid: &MacAddress,
    station: &MacAddress,
    reason: DeauthenticationReason,
) -> Vec<u8> {
    Deauthentication {
        header: management_header(
            FrameSubType::Deauthentication,
            DEAUTH_DURATION,
            *bssid,
            *station,
            *bssid,
        ),
        reason_code: reason,
    }
    .encode()
}

/// Disassociation from the AP to `target`, which may be broadcast.
pub fn build_disassoc_frame(
    bssid: &MacAddress,
    target: &MacAddress,
    reason: DeauthenticationReason,
) -> Vec<u8> {
    Disassociation {
        header: management_header(
            FrameSubType::Disassociation,
            DEAUTH_DURATION,
            *target,
            *bssid,
            *bssid,
        ),
        reason_code: reason,
    }
    .encode()
}

/// Disassociation spoofed from `station` to its AP.
pub fn build_disassoc_frame_from_station(
    bssid: &MacAddress,
    station: &MacAddress,
    reason: DeauthenticationReason,
) -> Vec<u8> {
    Disassociation {
        header: management_header(
            FrameSubType::Disassociation,
            DEAUTH_DURATION,
            *bssid,
            *station,
            *bssid,
        ),
        reason_code: reason,
    }
    .encode()
}

fn advertised_elements(ssid: &str, channel: u8) -> StationInfo {
    StationInfo {
        ssid: Some(truncate_ssid(ssid).to_string()),
        ssid_length: None,
        supported_rates: RATES.to_vec(),
        ds_parameter_set: Some(channel),
        ..Default::default()
    }
}

/// Broadcast beacon for `ssid` with `spoof_mac` as transmitter and BSSID.
pub fn build_beacon_frame(ssid: &str, spoof_mac: &MacAddress, channel: u8) -> Vec<u8> {
    let mut station_info = advertised_elements(ssid, channel);
    station_info.vendor_specific.push(VendorSpecificInfo {
        oui: WFA_VENDOR_OUI,
        oui_type: 0x00,
        data: vec![0x08, 0x00, 0x00, 0x40, 0x00, 0x00, 0x01],
    });

    Beacon {
        header: management_header(
            FrameSubType::Beacon,
            [0, 0],
            MacAddress::broadcast(),
            *spoof_mac,
            *spoof_mac,
        ),
        timestamp: 0,
        beacon_interval: BEACON_INTERVAL,
        capability_info: CAPABILITY_INFO,
        station_info,
    }
    .encode()
}

/// Unicast probe response for `ssid` from `ap_mac` to `dest_mac`.
pub fn build_probe_response(
    ssid: &str,
    dest_mac: &MacAddress,
    channel: u8,
    ap_mac: &MacAddress,
) -> Vec<u8> {
    ProbeResponse {
        header: management_header(
            FrameSubType::ProbeResponse,
            [0, 0],
            *dest_mac,
            *ap_mac,
            *ap_mac,
        ),
        timestamp: 0,
        beacon_interval: BEACON_INTERVAL,
        capability_info: CAPABILITY_INFO,
        station_info: advertised_elements(ssid, channel),
    }
    .encode()
}

/// SAE commit (group 19) from a spoofed station to `bssid`.
pub fn build_sae_commit_frame(
    bssid: &MacAddress,
    spoof_mac: &MacAddress,
    sequence: u16,
    scalar: &[u8],
    element: &[u8],
    token: Option<&[u8]>,
) -> Vec<u8> {
    let mut header = management_header(
        FrameSubType::Authentication,
        [0, 0],
        *bssid,
        *spoof_mac,
        *bssid,
    );
    header.sequence_control = SequenceControl::new(sequence);

    Authentication {
        header,
        auth_algorithm: AUTH_ALGORITHM_SAE,
        auth_seq: 1,
        status_code: 0,
        challenge_text: None,
        sae_commit: Some(SaeCommit {
            group_id: 19,
            scalar: scalar.to_vec(),
            element: element.to_vec(),
            anti_clogging_token: token.map(<[u8]>::to_vec),
        }),
    }
    .encode()
}

/// SSIDs are at most 32 bytes. Cut on a char boundary below that.
pub fn truncate_ssid(ssid: &str) -> &str {
    if ssid.len() <= 32 {
        return ssid;
    }
    let mut end = 32;
    while !ssid.is_char_boundary(end) {
        end -= 1;
    }
    &ssid[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use libwifi::frame::Frame;
    use libwifi::parse_frame;

    const BSSID: MacAddress = MacAddress([0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
    const STA: MacAddress = MacAddress([0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]);

    #[test]
    fn test_deauth_layout() {
        let frame = build_deauth_frame(
            &BSSID,
            &MacAddress::broadcast(),
            DeauthenticationReason::Class3FrameReceivedFromNonassociatedSTA,
        );
        assert_eq!(frame.len(), 26);
        assert_eq!(&frame[0..4], &[0xc0, 0x00, 0x3a, 0x01]);
        assert_eq!(&frame[4..10], &[0xff; 6]);
        assert_eq!(&frame[10..16], &BSSID.0);
        assert_eq!(&frame[16..22], &BSSID.0);
        assert_eq!(&frame[24..26], &[0x07, 0x00]);
        // Fragment number stays zero.
        assert_eq!(frame[22] & 0x0f, 0);
    }

    #[test]
    fn test_deauth_roundtrip() {
        let reason = DeauthenticationReason::DeauthenticatedBecauseSTAIsLeaving;
        let frame = build_deauth_frame(&BSSID, &STA, reason);
        let Ok(Frame::Deauthentication(parsed)) = parse_frame(&frame, false) else {
            panic!("deauth should parse");
        };
        assert_eq!(parsed.header.address_1, STA);
        assert_eq!(parsed.header.address_2, BSSID);
        assert_eq!(parsed.header.address_3, BSSID);
        assert_eq!(parsed.reason_code, reason);
    }

    #[test]
    fn test_station_direction() {
        let frame = build_disassoc_frame_from_station(
            &BSSID,
            &STA,
            DeauthenticationReason::Class3FrameReceivedFromNonassociatedSTA,
        );
        assert_eq!(frame[0], 0xa0);
        let Ok(Frame::Disassociation(parsed)) = parse_frame(&frame, false) else {
            panic!("disassoc should parse");
        };
        assert_eq!(parsed.header.address_1, BSSID);
        assert_eq!(parsed.header.address_2, STA);
    }

    #[test]
    fn test_beacon_elements() {
        let spoof = MacAddress([0x02, 1, 2, 3, 4, 5]);
        let frame = build_beacon_frame("Free WiFi", &spoof, 11);
        assert_eq!(frame[0], 0x80);
        assert_eq!(&frame[32..34], &[0x64, 0x00]);
        assert_eq!(&frame[34..36], &[0x11, 0x04]);

        let Ok(Frame::Beacon(beacon)) = parse_frame(&frame, false) else {
            panic!("beacon should parse");
        };
        assert_eq!(beacon.header.address_1, MacAddress::broadcast());
        assert_eq!(beacon.header.address_2, spoof);
        assert_eq!(beacon.header.address_3, spoof);
        assert_eq!(beacon.station_info.visible_ssid(), Some("Free WiFi"));
        assert_eq!(beacon.station_info.supported_rates, RATES.to_vec());
        assert_eq!(beacon.station_info.ds_parameter_set, Some(11));
        assert_eq!(beacon.station_info.vendor_specific.len(), 1);
    }

    #[test]
    fn test_probe_response_is_unicast() {
        let ap = MacAddress([0x02, 9, 9, 9, 9, 9]);
        let frame = build_probe_response("CoffeeShop", &STA, 6, &ap);
        let Ok(Frame::ProbeResponse(response)) = parse_frame(&frame, false) else {
            panic!("probe response should parse");
        };
        assert_eq!(response.header.address_1, STA);
        assert_eq!(response.header.address_2, ap);
        assert_eq!(response.station_info.visible_ssid(), Some("CoffeeShop"));
        assert_eq!(response.station_info.ds_parameter_set, Some(6));
    }

    #[test]
    fn test_sequence_is_randomized() {
        let sequences: std::collections::HashSet<[u8; 2]> = (0..32)
            .map(|_| {
                let frame = build_deauth_frame(
                    &BSSID,
                    &STA,
                    DeauthenticationReason::UnspecifiedReason,
                );
                [frame[22], frame[23]]
            })
            .collect();
        assert!(sequences.len() > 1);
    }

    #[test]
    fn test_ssid_truncation() {
        let long = "x".repeat(40);
        assert_eq!(truncate_ssid(&long).len(), 32);
        let multibyte = "é".repeat(20);
        assert!(truncate_ssid(&multibyte).len() <= 32);
    }

    #[test]
    fn test_limiter_rolling_window() {
        let limiter = FrameRateLimiter::new(3);
        let start = Instant::now();
        assert!(limiter.try_acquire_at(start));
        assert!(limiter.try_acquire_at(start + Duration::from_millis(400)));
        assert!(limiter.try_acquire_at(start + Duration::from_millis(800)));
        assert!(!limiter.try_acquire_at(start + Duration::from_millis(900)));
        // Only the first frame has left the window.
        assert!(limiter.try_acquire_at(start + Duration::from_millis(1000)));
        assert!(!limiter.try_acquire_at(start + Duration::from_millis(1300)));
        assert!(limiter.try_acquire_at(start + Duration::from_millis(1400)));
    }
}
