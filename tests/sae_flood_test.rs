mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use wifi_oxide::crypto::{CryptoError, Pwe, PweRequest, SaeCommitMaterial, SaeCrypto};
use wifi_oxide::devices::{AccessPoint, AuthMode};
use wifi_oxide::interface::RadioInterface;
use wifi_oxide::rx::RxOwner;
use wifi_oxide::sae::SaeState;
use wifi_oxide::{Engine, EngineConfig, EngineError};

/// Header, algorithm/sequence/status, group, scalar and element.
const COMMIT_LEN: usize = 24 + 6 + 2 + 32 + 64;

fn wpa3_ap() -> AccessPoint {
    AccessPoint::new(bssid(0), "wpa3-net", 6, -45).with_auth_mode(AuthMode::Wpa3Psk)
}

fn start_flood(h: &Harness) {
    scan_in(h, vec![wpa3_ap()]);
    h.engine.select_ap(0).unwrap();
    h.engine.start_sae_flood("password").unwrap();
    assert_eq!(h.engine.sae_state(), SaeState::Flooding);
}

/// Fails PWE derivation on the listed call numbers, counting from zero.
/// Precompute derives the pool in order, so call `n` is pool slot `n`.
struct FailingCrypto {
    calls: AtomicUsize,
    fail_calls: HashSet<usize>,
}

impl FailingCrypto {
    fn new(fail_calls: impl IntoIterator<Item = usize>) -> Self {
        FailingCrypto {
            calls: AtomicUsize::new(0),
            fail_calls: fail_calls.into_iter().collect(),
        }
    }
}

impl SaeCrypto for FailingCrypto {
    fn derive_pwe(&self, _request: &PweRequest) -> Result<Pwe, CryptoError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_calls.contains(&call) {
            return Err(CryptoError::PweNotFound(40));
        }
        Ok(Pwe {
            x: [0x11; 32],
            y: [0x22; 32],
        })
    }

    fn commit(&self, _pwe: &Pwe) -> Result<SaeCommitMaterial, CryptoError> {
        Ok(SaeCommitMaterial {
            scalar: [0x33; 32],
            element: [0x44; 64],
        })
    }
}

fn harness_with_crypto(config: EngineConfig, crypto: FailingCrypto) -> Harness {
    let radio = MockRadio::new();
    let portal = Arc::new(MockPortal::default());
    let display = Arc::new(RecordingDisplay::default());
    let collaborators = collaborators_for(&radio, &portal, &display);
    Harness {
        engine: Engine::with_crypto(collaborators, config, Arc::new(crypto)),
        radio,
        portal,
        display,
    }
}

fn commits(h: &Harness) -> Vec<SentFrame> {
    h.radio
        .frames()
        .into_iter()
        .filter(|f| f.subtype() == SUBTYPE_AUTH)
        .collect()
}

#[test]
fn test_pool_rotation_without_token() {
    let h = harness_with(fast_config().sae_pool_size(3).sae_frames_per_mac(2));
    start_flood(&h);
    let pool = h.engine.sae().pool_macs();
    assert_eq!(pool.len(), 3);

    assert!(wait_for(Duration::from_secs(5), || commits(&h).len() >= 12));
    h.engine.stop_sae_flood();

    let frames = commits(&h);
    for (i, frame) in frames.iter().take(12).enumerate() {
        assert_eq!(frame.addr(2), pool[(i / 2) % 3], "frame {i}");
        assert_eq!(frame.addr(1), bssid(0));
        assert_eq!(frame.iface, RadioInterface::Station);
        assert_eq!(frame.bytes.len(), COMMIT_LEN);
        assert_eq!(frame.channel, 6);
    }
    for mac in &pool {
        assert_eq!(mac.0[0] & 0x03, 0x02, "{mac} not local unicast");
    }
}

#[test]
fn test_status_76_pins_mac_and_token() {
    let h = harness();
    start_flood(&h);
    assert!(wait_for(Duration::from_secs(5), || commits(&h).len() >= 2));
    let pool = h.engine.sae().pool_macs();
    let pinned = pool[1];
    let token = [0xA5u8; 16];

    assert!(h
        .radio
        .inject(sae_response(bssid(0), pinned, 76, &token), -40));
    assert_eq!(h.engine.sae().pinned_mac(), Some(pinned));

    let n = commits(&h).len();
    assert!(wait_for(Duration::from_secs(5), || commits(&h).len() >= n + 6));
    for frame in &commits(&h)[n + 1..n + 6] {
        assert_eq!(frame.addr(2), pinned);
        assert_eq!(frame.bytes.len(), COMMIT_LEN + token.len());
        assert!(frame.bytes.ends_with(&token));
    }

    // Accepted: back to plain rotation.
    h.radio.inject(sae_response(bssid(0), pinned, 0, &[]), -40);
    assert_eq!(h.engine.sae().pinned_mac(), None);
    let m = commits(&h).len();
    assert!(wait_for(Duration::from_secs(5), || commits(&h).len() >= m + 3));
    assert!(commits(&h)[m + 1..]
        .iter()
        .all(|f| f.bytes.len() == COMMIT_LEN));

    let stats = h.engine.sae_stats();
    assert_eq!(stats.status76, 1);
    assert_eq!(stats.token_rx, 1);
    assert_eq!(stats.status0, 1);

    h.radio
        .inject(sae_response(bssid(0), pinned, 76, &token), -40);
    assert!(h.engine.stop_sae_flood());
    assert_eq!(h.engine.sae().pinned_mac(), None);
    assert_eq!(h.engine.sae_state(), SaeState::Idle);
    assert!(!h.radio.promiscuous());
}

#[test]
fn test_foreign_pin_is_derived_and_token_capped() {
    let h = harness();
    start_flood(&h);
    let foreign = station_mac(9);
    let token: Vec<u8> = (0..40).collect();

    h.radio
        .inject(sae_response(bssid(0), foreign, 76, &token), -40);
    let n = commits(&h).len();
    assert!(wait_for(Duration::from_secs(5), || commits(&h).len() >= n + 3));
    h.engine.stop_sae_flood();

    let frame = &commits(&h)[n + 1];
    assert_eq!(frame.addr(2), foreign);
    assert!(frame.bytes.ends_with(&token[..32]));
    assert!(h.engine.sae_stats().misses >= 1);
}

#[test]
fn test_responses_from_other_aps_are_ignored() {
    let h = harness();
    start_flood(&h);
    h.radio
        .inject(sae_response(bssid(5), station_mac(1), 76, &[1, 2, 3]), -40);
    assert_eq!(h.engine.sae().pinned_mac(), None);
    assert_eq!(h.engine.sae_stats().status76, 0);
}

#[test]
fn test_queue_full_backs_off_and_recovers() {
    let h = harness();
    h.radio.fail_next(3);
    start_flood(&h);

    assert!(wait_for(Duration::from_secs(5), || {
        let stats = h.engine.sae_stats();
        stats.tx_err >= 3 && stats.tx_ok >= 2
    }));
    h.engine.stop_sae_flood();
}

#[test]
fn test_flood_refuses_bad_targets() {
    let h = harness();
    assert!(matches!(
        h.engine.start_sae_flood("password"),
        Err(EngineError::InvalidTarget(_))
    ));

    scan_in(&h, five_aps());
    h.engine.select_ap(0).unwrap();
    match h.engine.start_sae_flood("password") {
        Err(EngineError::InvalidTarget(message)) => {
            assert_eq!(message, "Selected AP does not support WPA3/SAE authentication")
        }
        other => panic!("expected InvalidTarget, got {other:?}"),
    }

    scan_in(&h, vec![wpa3_ap()]);
    h.engine.select_ap(0).unwrap();
    assert!(h.engine.start_sae_flood(&"x".repeat(64)).is_err());
    assert_eq!(h.engine.sae_state(), SaeState::Idle);
    assert_eq!(h.radio.frame_count(), 0);
}

#[test]
fn test_second_flood_is_busy() {
    let h = harness();
    start_flood(&h);
    assert!(matches!(
        h.engine.start_sae_flood("password"),
        Err(EngineError::Busy(_))
    ));
    assert!(h.engine.stop_sae_flood());
    assert!(!h.engine.stop_sae_flood());
}

#[test]
fn test_failed_precompute_slot_is_skipped() {
    let h = harness_with_crypto(
        fast_config().sae_pool_size(3).sae_frames_per_mac(2),
        FailingCrypto::new([1]),
    );
    start_flood(&h);
    let pool = h.engine.sae().pool_macs();
    assert_eq!(pool.len(), 3);
    assert_eq!(h.engine.sae_stats().pwe_failures, 1);

    assert!(wait_for(Duration::from_secs(5), || commits(&h).len() >= 8));
    h.engine.stop_sae_flood();

    let senders: Vec<_> = commits(&h).iter().take(8).map(|f| f.addr(2)).collect();
    assert_eq!(
        senders,
        vec![pool[0], pool[0], pool[2], pool[2], pool[0], pool[0], pool[2], pool[2]]
    );
    let stats = h.engine.sae_stats();
    assert!(stats.skipped >= 4, "skipped {}", stats.skipped);
    assert_eq!(stats.pwe_failures, 1);
}

#[test]
fn test_flood_refuses_when_every_precompute_fails() {
    let h = harness_with_crypto(fast_config().sae_pool_size(3), FailingCrypto::new(0..3));
    scan_in(&h, vec![wpa3_ap()]);
    h.engine.select_ap(0).unwrap();

    assert!(matches!(
        h.engine.start_sae_flood("password"),
        Err(EngineError::Crypto(CryptoError::PweNotFound(_)))
    ));
    assert_eq!(h.engine.sae_state(), SaeState::Idle);
    assert_eq!(h.engine.sae_stats().pwe_failures, 3);
    assert!(!h.radio.promiscuous());
    assert_eq!(h.radio.frame_count(), 0);
}

#[test]
fn test_stopping_tracker_leaves_flood_receiving() {
    let h = harness();
    scan_in(&h, vec![wpa3_ap()]);
    h.engine.select_ap(0).unwrap();
    h.engine.track_ap().unwrap();
    assert_eq!(h.engine.rx_owner(), Some(RxOwner::Track));

    h.engine.start_sae_flood("password").unwrap();
    assert_eq!(h.engine.rx_owner(), Some(RxOwner::Sae));

    assert!(h.engine.stop_tracking());
    assert!(h.radio.promiscuous());
    assert_eq!(h.engine.rx_owner(), Some(RxOwner::Sae));

    let pinned = h.engine.sae().pool_macs()[0];
    assert!(h
        .radio
        .inject(sae_response(bssid(0), pinned, 76, &[0x5a; 8]), -40));
    assert_eq!(h.engine.sae().pinned_mac(), Some(pinned));

    assert!(h.engine.stop_sae_flood());
    assert!(!h.radio.promiscuous());
    assert_eq!(h.engine.rx_owner(), None);
}
