use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use itertools::Itertools;
use log::{debug, info, warn};
use strum_macros::Display;

use crate::error::EngineError;
use crate::interface::{RadioDriver, SecondaryChannel};
use crate::task::{Worker, STOP_GRACE};

/// Non-overlapping 2.4 GHz channels, always hopped first.
pub const PRIMARY_24GHZ: [u8; 3] = [1, 6, 11];

const UNII_1: std::ops::RangeInclusive<u8> = 36..=48;
const UNII_1_2: std::ops::RangeInclusive<u8> = 36..=64;
const UNII_2E_144: std::ops::RangeInclusive<u8> = 100..=144;
const UNII_2E_140: std::ops::RangeInclusive<u8> = 100..=140;
const UNII_3: std::ops::RangeInclusive<u8> = 149..=165;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum HopMode {
    /// Station discovery across 2.4 GHz and any 5 GHz channel with a known AP.
    StationScan,
    /// Packet capture following the regulatory channel list.
    Capture,
    /// Live AP survey over every common channel.
    LiveAp,
}

impl HopMode {
    pub fn interval(&self) -> Duration {
        match self {
            HopMode::StationScan => Duration::from_millis(250),
            HopMode::Capture => Duration::from_millis(150),
            HopMode::LiveAp => Duration::from_millis(250),
        }
    }
}

/// Regulatory domain entry: highest 2.4 GHz channel plus legal 5 GHz ranges.
struct Region {
    codes: &'static [&'static str],
    max_24ghz: u8,
    bands_5ghz: &'static [std::ops::RangeInclusive<u8>],
}

const REGIONS: &[Region] = &[
    Region {
        codes: &["US", "CA"],
        max_24ghz: 11,
        bands_5ghz: &[UNII_1_2, UNII_2E_144, UNII_3],
    },
    Region {
        codes: &["JP"],
        max_24ghz: 14,
        bands_5ghz: &[UNII_1_2, UNII_2E_140],
    },
    Region {
        codes: &["EU", "GB", "DE", "FR", "ES", "IT", "NL"],
        max_24ghz: 13,
        bands_5ghz: &[UNII_1_2, UNII_2E_140],
    },
    Region {
        codes: &["CN"],
        max_24ghz: 13,
        bands_5ghz: &[UNII_1_2, UNII_3],
    },
    Region {
        codes: &["AU", "NZ", "KR", "BR", "IN"],
        max_24ghz: 13,
        bands_5ghz: &[UNII_1],
    },
];

/// Ordered hop list for a country: 1, 6, 11, then the other legal 2.4 GHz
/// channels, then the legal 5 GHz channels. Unknown countries only get
/// 1, 6 and 11.
pub fn build_channel_list(country_code: &str) -> Vec<u8> {
    let code = country_code.trim().to_ascii_uppercase();
    let Some(region) = REGIONS.iter().find(|r| r.codes.contains(&code.as_str())) else {
        return PRIMARY_24GHZ.to_vec();
    };

    let mut channels = PRIMARY_24GHZ.to_vec();
    channels.extend((1..=region.max_24ghz).filter(|c| !PRIMARY_24GHZ.contains(c)));
    for band in region.bands_5ghz {
        channels.extend(band.clone().step_by(4));
    }
    channels
}

/// Every common 2.4 and 5 GHz channel, used by live AP surveys.
pub fn live_ap_channels() -> Vec<u8> {
    (1..=13)
        .chain(UNII_1_2.step_by(4))
        .chain(UNII_2E_144.step_by(4))
        .chain(UNII_3.step_by(4))
        .collect()
}

/// Channels 1 to 13 plus whatever 5 GHz channels the scanned APs use.
pub fn station_scan_channels(ap_channels: impl IntoIterator<Item = u8>) -> Vec<u8> {
    (1..=13)
        .chain(ap_channels.into_iter().filter(|c| *c > 14))
        .unique()
        .collect()
}

pub fn is_valid_channel(channel: u8) -> bool {
    (1..=14).contains(&channel)
        || (UNII_1_2.contains(&channel) && channel % 4 == 0)
        || (UNII_2E_144.contains(&channel) && channel % 4 == 0)
        || (UNII_3.contains(&channel) && channel % 4 == 1)
}

/// 5 GHz channels are tuned as HT40 with the secondary above.
pub fn secondary_for(channel: u8) -> SecondaryChannel {
    if channel > 14 {
        SecondaryChannel::Above
    } else {
        SecondaryChannel::None
    }
}

/// Position of a running hopper in its channel list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelHopState {
    pub channel_list: Vec<u8>,
    pub index: usize,
    pub interval: Duration,
    pub mode: HopMode,
}

impl ChannelHopState {
    pub fn new(channel_list: Vec<u8>, interval: Duration, mode: HopMode) -> Self {
        ChannelHopState {
            channel_list,
            index: 0,
            interval,
            mode,
        }
    }

    /// The channel to tune next, wrapping at the end of the list.
    pub fn advance(&mut self) -> Option<u8> {
        if self.channel_list.is_empty() {
            return None;
        }
        let channel = self.channel_list[self.index % self.channel_list.len()];
        self.index = (self.index + 1) % self.channel_list.len();
        Some(channel)
    }
}

struct ActiveHopper {
    mode: HopMode,
    worker: Worker,
}

/// Owns the single channel hopper.
///
/// `active` holds at most one hopper and `start` replaces it while holding
/// the lock, so two hop modes can never run side by side.
pub struct ChannelHopScheduler {
    radio: Arc<dyn RadioDriver>,
    pending: Mutex<Option<ChannelHopState>>,
    active: Mutex<Option<ActiveHopper>>,
    live_threads: Arc<AtomicUsize>,
}

impl ChannelHopScheduler {
    pub fn new(radio: Arc<dyn RadioDriver>) -> Self {
        ChannelHopScheduler {
            radio,
            pending: Mutex::new(None),
            active: Mutex::new(None),
            live_threads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Stage a hop plan for the next [start](Self::start).
    pub fn configure(&self, channels: Vec<u8>, interval: Duration, mode: HopMode) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(ChannelHopState::new(channels, interval, mode));
        }
    }

    /// Start the configured plan, stopping whichever hopper is running.
    pub fn start(&self) -> Result<(), EngineError> {
        let state = self
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.take())
            .ok_or_else(|| EngineError::invalid_target("no channel hop plan configured"))?;
        if state.channel_list.is_empty() {
            return Err(EngineError::invalid_target("channel hop list is empty"));
        }

        let mut active = self
            .active
            .lock()
            .map_err(|_| EngineError::invalid_target("channel hopper state poisoned"))?;
        if let Some(previous) = active.take() {
            debug!("Replacing {} hopper", previous.mode);
            previous.worker.stop(STOP_GRACE);
        }

        let mode = state.mode;
        info!(
            "Channel hopping ({mode}) every {}ms over {:?}",
            state.interval.as_millis(),
            state.channel_list
        );

        let radio = self.radio.clone();
        let live = self.live_threads.clone();
        let worker = Worker::spawn("channel-hopper", move |token| {
            live.fetch_add(1, Ordering::SeqCst);
            let mut state = state;
            while !token.is_cancelled() {
                if let Some(channel) = state.advance() {
                    if let Err(e) = radio.set_channel(channel, secondary_for(channel)) {
                        warn!("Channel hop to {channel} failed: {e}");
                    }
                }
                if !token.sleep(state.interval) {
                    break;
                }
            }
            live.fetch_sub(1, Ordering::SeqCst);
        })?;

        *active = Some(ActiveHopper { mode, worker });
        Ok(())
    }

    /// Configure and start in one step.
    pub fn start_mode(&self, mode: HopMode, channels: Vec<u8>) -> Result<(), EngineError> {
        self.configure(channels, mode.interval(), mode);
        self.start()
    }

    pub fn stop(&self) {
        let previous = self.active.lock().ok().and_then(|mut active| active.take());
        if let Some(previous) = previous {
            previous.worker.stop(STOP_GRACE);
            info!("Channel hopping ({}) stopped", previous.mode);
        }
    }

    /// Stop hopping and park the radio on `channel`.
    pub fn set_fixed_channel(&self, channel: u8) -> Result<(), EngineError> {
        if !is_valid_channel(channel) {
            return Err(EngineError::invalid_target(format!(
                "invalid channel {channel}"
            )));
        }
        self.stop();
        self.radio.set_channel(channel, secondary_for(channel))?;
        info!("Locked to channel {channel}");
        Ok(())
    }

    pub fn active_mode(&self) -> Option<HopMode> {
        self.active
            .lock()
            .ok()
            .and_then(|active| active.as_ref().map(|hopper| hopper.mode))
    }

    /// Hopper threads currently alive.
    pub fn running_hoppers(&self) -> usize {
        self.live_threads.load(Ordering::SeqCst)
    }
}

impl Drop for ChannelHopScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_us_channel_list() {
        let channels = build_channel_list("us");
        assert_eq!(&channels[..3], &[1, 6, 11]);
        assert_eq!(&channels[3..11], &[2, 3, 4, 5, 7, 8, 9, 10]);
        assert!(!channels.contains(&12));
        assert!(channels.contains(&144));
        assert!(channels.contains(&165));
        assert!(channels.iter().all(|c| is_valid_channel(*c)));
        assert_eq!(channels.iter().unique().count(), channels.len());
    }

    #[test]
    fn test_regional_5ghz_subsets() {
        let jp = build_channel_list("JP");
        assert!(jp.contains(&14));
        assert!(jp.contains(&140));
        assert!(!jp.contains(&144));
        assert!(!jp.contains(&149));

        let cn = build_channel_list("CN");
        assert!(cn.contains(&149));
        assert!(!cn.contains(&100));

        let de = build_channel_list("DE");
        assert!(de.contains(&13));
        assert!(!de.contains(&149));
    }

    #[test]
    fn test_unknown_country_is_restrictive() {
        assert_eq!(build_channel_list("ZZ"), vec![1, 6, 11]);
        assert_eq!(build_channel_list(""), vec![1, 6, 11]);
    }

    #[test]
    fn test_station_scan_channels() {
        let channels = station_scan_channels([6, 36, 36, 149]);
        assert_eq!(channels.len(), 15);
        assert_eq!(&channels[13..], &[36, 149]);
    }

    #[test]
    fn test_hop_state_wraps() {
        let mut state = ChannelHopState::new(vec![1, 6, 11], Duration::ZERO, HopMode::Capture);
        let seen: Vec<u8> = (0..5).filter_map(|_| state.advance()).collect();
        assert_eq!(seen, vec![1, 6, 11, 1, 6]);
    }

    #[test]
    fn test_channel_validation() {
        assert!(is_valid_channel(1));
        assert!(is_valid_channel(36));
        assert!(is_valid_channel(165));
        assert!(!is_valid_channel(0));
        assert!(!is_valid_channel(37));
        assert!(!is_valid_channel(200));
        assert_eq!(secondary_for(44), SecondaryChannel::Above);
        assert_eq!(secondary_for(6), SecondaryChannel::None);
    }
}
