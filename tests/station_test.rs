mod common;

use std::sync::Arc;

use common::*;
use libwifi::frame::components::MacAddress;
use wifi_oxide::hopper::HopMode;
use wifi_oxide::stations::StationCorrelator;

#[test]
fn test_station_scan_discovers_clients() {
    let h = harness();
    scan_in(&h, five_aps());
    h.engine.start_station_scan().unwrap();
    assert_eq!(h.engine.hopper().active_mode(), Some(HopMode::StationScan));

    // To the AP, from the AP, and via addr3.
    h.radio
        .inject(mgmt_frame(0, bssid(0), station_mac(1), bssid(0)), -40);
    h.radio
        .inject(mgmt_frame(5, station_mac(2), bssid(1), bssid(1)), -40);
    h.radio.inject(
        mgmt_frame(13, MacAddress::broadcast(), station_mac(3), bssid(2)),
        -40,
    );
    // Repeat of a known station.
    h.radio
        .inject(mgmt_frame(0, bssid(0), station_mac(1), bssid(0)), -40);

    let stations = h.engine.stations();
    assert_eq!(stations.len(), 3);
    assert_eq!((stations[0].mac, stations[0].bssid), (station_mac(1), bssid(0)));
    assert_eq!((stations[1].mac, stations[1].bssid), (station_mac(2), bssid(1)));
    assert_eq!((stations[2].mac, stations[2].bssid), (station_mac(3), bssid(2)));

    h.engine.stop_monitor_mode();
    assert!(!h.radio.promiscuous());
    assert_eq!(h.engine.hopper().active_mode(), None);
}

#[test]
fn test_never_reports_bssids_or_group_addresses() {
    let h = harness();
    scan_in(&h, five_aps());
    h.engine.start_station_scan().unwrap();

    // Beacon: AP to broadcast.
    h.radio
        .inject(mgmt_frame(8, MacAddress::broadcast(), bssid(0), bssid(0)), -40);
    // Between two scanned APs.
    h.radio
        .inject(mgmt_frame(0, bssid(1), bssid(2), bssid(1)), -40);
    // Multicast source.
    let multicast = MacAddress([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]);
    h.radio
        .inject(mgmt_frame(0, bssid(3), multicast, bssid(3)), -40);
    // Nothing to do with any scanned AP.
    h.radio.inject(
        mgmt_frame(4, MacAddress::broadcast(), station_mac(9), MacAddress::broadcast()),
        -40,
    );

    assert!(h.engine.stations().is_empty());
}

#[test]
fn test_data_frames_are_filtered() {
    let h = harness();
    scan_in(&h, five_aps());
    h.engine.start_station_scan().unwrap();

    let mut data = mgmt_frame(0, bssid(0), station_mac(4), bssid(0));
    data[0] = 0x08;
    assert!(!h.radio.inject(data, -40));
    assert!(h.engine.stations().is_empty());
}

#[test]
fn test_correlator_ignores_data_frames() {
    let collaborators = collaborators_for(
        &MockRadio::new(),
        &Arc::new(MockPortal::default()),
        &Arc::new(RecordingDisplay::default()),
    );
    let correlator = StationCorrelator::new(collaborators);
    correlator.set_known_aps(Arc::new(five_aps()));

    let mut data = mgmt_frame(0, bssid(0), station_mac(4), bssid(0));
    data[0] = 0x08;
    assert_eq!(correlator.on_frame(&data), None);
    assert!(correlator.stations().is_empty());

    // The same addresses in a management frame do correlate.
    let mgmt = mgmt_frame(0, bssid(0), station_mac(4), bssid(0));
    let station = correlator.on_frame(&mgmt).unwrap();
    assert_eq!((station.mac, station.bssid), (station_mac(4), bssid(0)));
}

#[test]
fn test_station_scan_needs_results() {
    let h = harness();
    assert!(h.engine.start_station_scan().is_err());
    assert!(!h.radio.promiscuous());
}
