use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use strum_macros::Display;

use crate::interface::{DriverError, FrameCallback, PacketFilter, RadioDriver};

/// Components that can hold the promiscuous callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum RxOwner {
    #[strum(serialize = "station scan")]
    StationScan,
    #[strum(serialize = "SAE flood")]
    Sae,
    #[strum(serialize = "karma")]
    Karma,
    #[strum(serialize = "tracking")]
    Track,
}

/// The radio has a single promiscuous callback. Whoever claimed it last owns
/// it, and only the owner may switch promiscuous mode off again.
pub struct ReceivePath {
    radio: Arc<dyn RadioDriver>,
    owner: Mutex<Option<RxOwner>>,
}

impl ReceivePath {
    pub fn new(radio: Arc<dyn RadioDriver>) -> Self {
        ReceivePath {
            radio,
            owner: Mutex::new(None),
        }
    }

    pub fn owner(&self) -> Option<RxOwner> {
        self.owner.lock().ok().and_then(|owner| *owner)
    }

    /// Install `callback` for `owner`, replacing the current owner's.
    pub fn claim(&self, owner: RxOwner, callback: FrameCallback) -> Result<(), DriverError> {
        let mut current = self
            .owner
            .lock()
            .map_err(|_| DriverError::NotReady("receive path lock poisoned".to_string()))?;
        self.radio
            .set_promiscuous(true, PacketFilter::MGMT, Some(callback))?;
        match current.replace(owner) {
            Some(previous) if previous != owner => {
                info!("Receive path taken over from {previous} by {owner}")
            }
            _ => debug!("Receive path claimed by {owner}"),
        }
        Ok(())
    }

    /// Leave promiscuous mode if `owner` still holds the callback. Returns
    /// whether it did.
    pub fn release(&self, owner: RxOwner) -> bool {
        let Ok(mut current) = self.owner.lock() else {
            return false;
        };
        if *current != Some(owner) {
            debug!("{owner} no longer owns the receive path, leaving it alone");
            return false;
        }
        *current = None;
        if let Err(e) = self
            .radio
            .set_promiscuous(false, PacketFilter::MGMT, None)
        {
            warn!("Failed to leave promiscuous mode: {e}");
        }
        true
    }
}
