mod common;

use std::time::Duration;

use common::*;
use wifi_oxide::devices::AccessPoint;
use wifi_oxide::scan::MAX_SCANNED_APS;
use wifi_oxide::targets::TargetSelection;
use wifi_oxide::EngineError;

#[test]
fn test_select_multiple_keeps_order_and_primary() {
    let h = harness();
    scan_in(&h, five_aps());
    assert_eq!(h.engine.get_scan_results().len(), 5);

    h.engine.select_multiple_aps(&[0, 2, 4]).unwrap();

    let selected = h.engine.get_selected_aps().unwrap();
    let bssids: Vec<_> = selected.iter().map(|ap| ap.bssid).collect();
    assert_eq!(bssids, vec![bssid(0), bssid(2), bssid(4)]);
    assert_eq!(h.engine.selection().primary().unwrap().index, 0);
}

#[test]
fn test_bad_index_leaves_selection_alone() {
    let h = harness();
    scan_in(&h, five_aps());
    h.engine.select_ap(1).unwrap();

    let err = h.engine.select_multiple_aps(&[0, 9]).unwrap_err();
    assert!(matches!(err, EngineError::InvalidTarget(_)));
    assert!(h.engine.select_multiple_aps(&[]).is_err());
    assert!(h.engine.select_ap(5).is_err());

    let selected = h.engine.get_selected_aps().unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].bssid, bssid(1));
}

#[test]
fn test_rescan_clears_selection_and_stations() {
    let h = harness();
    scan_in(&h, five_aps());
    h.engine.start_station_scan().unwrap();
    h.radio
        .inject(mgmt_frame(0, bssid(0), station_mac(1), bssid(0)), -40);
    assert_eq!(h.engine.stations().len(), 1);
    h.engine.stop_monitor_mode();
    h.engine.select_station(0).unwrap();

    scan_in(&h, five_aps());
    assert!(h.engine.selection().is_none());
    assert!(h.engine.stations().is_empty());
}

#[test]
fn test_reordered_scan_invalidates_selection() {
    let h = harness();
    scan_in(&h, five_aps());
    h.engine.select_ap(2).unwrap();

    let mut reordered = five_aps();
    reordered.rotate_left(1);
    h.radio.set_scan_results(reordered);
    // Collect without start_scan so the selection survives.
    let results = h.engine.stop_scan().unwrap();
    assert_eq!(results.len(), 5);
    assert_ne!(results[2].bssid, bssid(2));

    assert!(h.engine.get_selected_aps().is_err());
}

#[test]
fn test_scan_results_are_capped() {
    let h = harness();
    let many: Vec<AccessPoint> = (0..120u8)
        .map(|n| ap(n, &format!("net{n}"), 1 + n % 11))
        .collect();
    scan_in(&h, many);
    assert_eq!(h.engine.get_scan_results().len(), MAX_SCANNED_APS);
}

#[test]
fn test_allocation_failure_discards_results() {
    let h = harness();
    scan_in(&h, five_aps());
    assert_eq!(h.engine.get_scan_results().len(), 5);

    h.radio.report_count(usize::MAX);
    h.engine.start_scan(Duration::from_millis(10)).unwrap();
    let err = h.engine.stop_scan().unwrap_err();

    assert!(matches!(
        err,
        EngineError::Allocation {
            requested: usize::MAX
        }
    ));
    assert!(h.engine.get_scan_results().is_empty());
    assert_eq!(h.engine.selection(), TargetSelection::None);
}

#[test]
fn test_held_snapshot_survives_rescan() {
    let h = harness();
    scan_in(&h, five_aps());
    let snapshot = h.engine.get_scan_results();

    scan_in(&h, vec![ap(9, "other", 3)]);

    assert_eq!(snapshot.len(), 5);
    assert_eq!(h.engine.get_scan_results().len(), 1);
}
