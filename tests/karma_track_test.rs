mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use libwifi::frame::components::MacAddress;
use wifi_oxide::devices::AccessPoint;
use wifi_oxide::interface::{RadioDriver, RadioInterface, WifiMode};
use wifi_oxide::track::Direction;

const RADIO_MAC: MacAddress = MacAddress([0x24, 0x0a, 0xc4, 0x11, 0x22, 0x33]);

fn probe_responses(h: &Harness) -> Vec<SentFrame> {
    h.radio
        .frames()
        .into_iter()
        .filter(|f| f.subtype() == SUBTYPE_PROBE_RESPONSE)
        .collect()
}

#[test]
fn test_single_ssid_karma_brings_up_portal() {
    let h = harness();
    h.engine.set_karma_ssids(&["FreeWiFi".to_string()]);
    h.engine.start_karma().unwrap();

    assert!(wait_for(Duration::from_secs(2), || h.engine.karma().portal_active()));
    assert_eq!(h.radio.mode().unwrap(), WifiMode::SoftAp);
    assert_eq!(
        h.portal.starts.lock().unwrap()[0],
        (
            "default".to_string(),
            "FreeWiFi".to_string(),
            String::new(),
            "FreeWiFi".to_string(),
            "portal.local".to_string()
        )
    );
    assert_eq!(h.radio.ap_configs()[0].ssid, "FreeWiFi");

    h.radio
        .inject(probe_request(station_mac(1), "FreeWiFi"), -40);
    h.radio.inject(probe_request(station_mac(2), "Other"), -40);

    let responses = probe_responses(&h);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].addr(1), station_mac(1));
    assert_eq!(responses[0].addr(2), RADIO_MAC);
    assert_eq!(responses[0].iface, RadioInterface::SoftAp);
    assert_eq!(h.engine.karma().cached_ssids(), vec!["FreeWiFi".to_string()]);

    assert!(h.engine.stop_karma());
    assert_eq!(h.portal.stops.load(Ordering::SeqCst), 1);
    assert!(!h.engine.karma().portal_active());
    assert!(h.engine.karma().cached_ssids().is_empty());
    assert!(!h.radio.promiscuous());
    assert!(h.display.statuses().contains(&"Karma Stopped".to_string()));
}

#[test]
fn test_karma_learns_and_rotates() {
    let h = harness();
    h.engine.start_karma().unwrap();
    assert!(matches!(
        h.engine.start_karma(),
        Err(wifi_oxide::EngineError::Busy(_))
    ));

    h.radio.inject(probe_request(station_mac(1), "home"), -40);
    h.radio.inject(probe_request(station_mac(2), "office"), -40);
    h.radio.inject(probe_request(station_mac(3), "home"), -40);
    assert_eq!(
        h.engine.karma().cached_ssids(),
        vec!["home".to_string(), "office".to_string()]
    );
    // Every probe for a cached SSID is answered.
    assert_eq!(probe_responses(&h).len(), 3);

    assert!(wait_for(Duration::from_secs(3), || h.radio.ap_configs().len() >= 2));
    let rotated: Vec<String> = h
        .radio
        .ap_configs()
        .into_iter()
        .map(|config| config.ssid)
        .collect();
    assert_eq!(&rotated[..2], &["home".to_string(), "office".to_string()]);
    // The portal comes up once, for the first SSID.
    assert_eq!(h.portal.starts.lock().unwrap().len(), 1);

    // Beacons advertise the cached SSIDs.
    assert!(wait_for(Duration::from_secs(2), || h
        .radio
        .frames()
        .iter()
        .any(|f| f.subtype() == SUBTYPE_BEACON)));

    h.engine.stop_karma();
    assert!(!h.engine.stop_karma());
}

#[test]
fn test_connected_client_freezes_karma() {
    let h = harness();
    h.radio.set_client_has_ip(true);
    h.engine
        .set_karma_ssids(&["one".to_string(), "two".to_string()]);
    h.engine.start_karma().unwrap();

    std::thread::sleep(Duration::from_millis(400));
    h.engine.stop_karma();

    assert!(h.radio.ap_configs().is_empty());
    assert!(!h
        .radio
        .frames()
        .iter()
        .any(|f| f.subtype() == SUBTYPE_BEACON));
}

#[test]
fn test_track_ap_reports_direction() {
    let h = harness();
    scan_in(&h, five_aps());
    h.engine.select_ap(1).unwrap();
    h.engine.track_ap().unwrap();

    assert_eq!(h.radio.channel_sets().last(), Some(&6));
    assert!(h.display.statuses().contains(&"Track AP".to_string()));
    assert!(h.engine.latest_track_reading().is_none());

    // Someone else's beacon.
    h.radio
        .inject(mgmt_frame(8, MacAddress::broadcast(), bssid(2), bssid(2)), -30);
    assert!(h.engine.latest_track_reading().is_none());

    h.radio
        .inject(mgmt_frame(8, MacAddress::broadcast(), bssid(1), bssid(1)), -40);
    let reading = h.engine.latest_track_reading().unwrap();
    assert_eq!(reading.direction, Some(Direction::Closer));
    assert_eq!((reading.min, reading.max), (-50, -40));
    assert_eq!(reading.to_string(), "##### -40 dBm (min:-50 max:-40)  CLOSER");

    h.radio
        .inject(mgmt_frame(8, MacAddress::broadcast(), bssid(1), bssid(1)), -43);
    assert_eq!(h.engine.latest_track_reading().unwrap().direction, None);

    assert!(h.engine.stop_tracking());
    assert!(!h.radio.promiscuous());
    assert!(h.display.statuses().contains(&"Track Stopped".to_string()));
    assert!(!h.engine.stop_tracking());
}

#[test]
fn test_track_ap_needs_visible_ssid() {
    let h = harness();
    assert!(h.engine.track_ap().is_err());

    scan_in(&h, vec![AccessPoint::new(bssid(0), "", 6, -50)]);
    h.engine.select_ap(0).unwrap();
    assert!(h.engine.track_ap().is_err());
    assert!(!h.radio.promiscuous());
}

#[test]
fn test_track_station_seeds_from_first_frame() {
    let h = harness();
    scan_in(&h, five_aps());
    h.engine.start_station_scan().unwrap();
    h.radio
        .inject(mgmt_frame(0, bssid(3), station_mac(7), bssid(3)), -40);
    h.engine.stop_monitor_mode();
    h.engine.select_station(0).unwrap();

    h.engine.track_sta().unwrap();
    assert_eq!(h.radio.channel_sets().last(), Some(&36));
    assert!(h.display.statuses().contains(&"Track STA".to_string()));

    h.radio
        .inject(mgmt_frame(4, MacAddress::broadcast(), station_mac(7), bssid(3)), -70);
    let first = h.engine.latest_track_reading().unwrap();
    assert_eq!(first.direction, None);
    assert_eq!((first.min, first.max), (-70, -70));

    h.radio
        .inject(mgmt_frame(4, MacAddress::broadcast(), station_mac(7), bssid(3)), -85);
    let second = h.engine.latest_track_reading().unwrap();
    assert_eq!(second.direction, Some(Direction::Farther));
    assert_eq!((second.min, second.max), (-85, -70));

    h.engine.stop_tracking();
}

#[test]
fn test_stop_all_leaves_radio_quiet() {
    let h = harness();
    scan_in(&h, five_aps());
    h.engine.start_karma().unwrap();
    h.engine.start_deauth().unwrap();
    h.engine.start_capture_hop().unwrap();

    h.engine.stop_all();
    assert!(h.engine.attack_state().is_idle());
    assert!(!h.engine.karma().is_running());
    assert_eq!(h.engine.hopper().active_mode(), None);
    assert!(!h.radio.promiscuous());

    let quiet = h.radio.frame_count();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(h.radio.frame_count(), quiet);
}
