use std::fmt;
use std::sync::{Arc, Mutex};

use libwifi::frame::components::MacAddress;
use libwifi::parsers::{parse_frame_control, parse_management_header};
use log::info;
use strum_macros::Display;

use crate::devices::{AccessPoint, Station};
use crate::error::EngineError;
use crate::interface::{Collaborators, FrameCallback, RxFrame, SecondaryChannel};
use crate::rx::{ReceivePath, RxOwner};

/// RSSI change that counts as moving.
const DIRECTION_THRESHOLD: i16 = 5;

/// Number of bars for a signal strength, 0 to 5.
pub fn signal_bars(rssi: i8) -> usize {
    match rssi {
        r if r > -50 => 5,
        r if r > -60 => 4,
        r if r > -70 => 3,
        r if r > -80 => 2,
        r if r > -90 => 1,
        _ => 0,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum TrackMode {
    #[strum(serialize = "Track AP")]
    Ap,
    #[strum(serialize = "Track STA")]
    Station,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Closer,
    Farther,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackReading {
    pub rssi: i8,
    pub min: i8,
    pub max: i8,
    pub direction: Option<Direction>,
}

impl fmt::Display for TrackReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Some(Direction::Closer) => "  CLOSER",
            Some(Direction::Farther) => "  FARTHER",
            None => "",
        };
        write!(
            f,
            "{} {} dBm (min:{} max:{}){}",
            "#".repeat(signal_bars(self.rssi)),
            self.rssi,
            self.min,
            self.max,
            direction
        )
    }
}

#[derive(Clone, Debug)]
struct TrackState {
    mode: TrackMode,
    target: MacAddress,
    last: Option<i8>,
    min: i8,
    max: i8,
    latest: Option<TrackReading>,
}

impl TrackState {
    /// Seeded from a known reading, e.g. the AP's scan RSSI.
    fn seeded(mode: TrackMode, target: MacAddress, rssi: i8) -> Self {
        TrackState {
            mode,
            target,
            last: Some(rssi),
            min: rssi,
            max: rssi,
            latest: None,
        }
    }

    /// Without a seed the first frame sets min and max.
    fn unseeded(mode: TrackMode, target: MacAddress) -> Self {
        TrackState {
            mode,
            target,
            last: None,
            min: i8::MAX,
            max: i8::MIN,
            latest: None,
        }
    }

    fn update(&mut self, rssi: i8) -> TrackReading {
        self.min = self.min.min(rssi);
        self.max = self.max.max(rssi);
        let direction = self.last.and_then(|last| {
            let delta = i16::from(rssi) - i16::from(last);
            if delta > DIRECTION_THRESHOLD {
                Some(Direction::Closer)
            } else if delta < -DIRECTION_THRESHOLD {
                Some(Direction::Farther)
            } else {
                None
            }
        });
        self.last = Some(rssi);

        let reading = TrackReading {
            rssi,
            min: self.min,
            max: self.max,
            direction,
        };
        self.latest = Some(reading);
        reading
    }
}

/// Signal strength readout for walking toward an AP or station.
pub struct SignalTracker {
    collaborators: Collaborators,
    rx: Arc<ReceivePath>,
    state: Arc<Mutex<Option<TrackState>>>,
}

impl SignalTracker {
    pub fn new(collaborators: Collaborators, rx: Arc<ReceivePath>) -> Self {
        SignalTracker {
            collaborators,
            rx,
            state: Arc::new(Mutex::new(None)),
        }
    }

    pub fn mode(&self) -> Option<TrackMode> {
        self.state.lock().ok()?.as_ref().map(|state| state.mode)
    }

    pub fn latest(&self) -> Option<TrackReading> {
        self.state.lock().ok()?.as_ref()?.latest
    }

    pub fn track_ap(&self, ap: &AccessPoint) -> Result<(), EngineError> {
        if ap.is_hidden() {
            return Err(EngineError::invalid_target(
                "No AP selected. Select an AP with a visible SSID first",
            ));
        }
        info!("=== tracking ap: {} ===", ap.ssid);
        info!("bssid: {} channel: {}", ap.bssid, ap.channel);
        self.begin(
            TrackState::seeded(TrackMode::Ap, ap.bssid, ap.rssi),
            ap.channel,
        )
    }

    pub fn track_sta(&self, station: &Station, channel: u8) -> Result<(), EngineError> {
        info!("=== tracking sta ===");
        info!("station: {} ap: {}", station.mac, station.bssid);
        self.begin(TrackState::unseeded(TrackMode::Station, station.mac), channel)
    }

    fn begin(&self, state: TrackState, channel: u8) -> Result<(), EngineError> {
        let mode = state.mode;
        if let Ok(mut current) = self.state.lock() {
            *current = Some(state);
        }

        let rx_state = self.state.clone();
        let callback: FrameCallback = Arc::new(move |frame: &RxFrame| on_frame(&rx_state, frame));
        let started = self
            .collaborators
            .radio
            .set_channel(channel, SecondaryChannel::None)
            .and_then(|_| self.rx.claim(RxOwner::Track, callback));
        if let Err(e) = started {
            if let Ok(mut current) = self.state.lock() {
                *current = None;
            }
            return Err(e.into());
        }

        info!("move closer to increase signal.");
        self.collaborators.display.show_status(&mode.to_string());
        Ok(())
    }

    pub fn stop_tracking(&self) -> bool {
        let previous = self.state.lock().ok().and_then(|mut state| state.take());
        if previous.is_none() {
            return false;
        }
        self.rx.release(RxOwner::Track);
        info!("tracking stopped.");
        self.collaborators.display.show_status("Track Stopped");
        true
    }
}

fn on_frame(state: &Mutex<Option<TrackState>>, rx: &RxFrame) {
    let Ok((rest, frame_control)) = parse_frame_control(&rx.payload) else {
        return;
    };
    let Ok((_, header)) = parse_management_header(frame_control, rest) else {
        return;
    };

    let reading = match state.lock() {
        Ok(mut state) => match state.as_mut() {
            Some(tracking) if tracking.target == header.address_2 => tracking.update(rx.rssi),
            _ => return,
        },
        Err(_) => return,
    };
    info!("{reading}");
}
