use libwifi::frame::components::MacAddress;

use crate::devices::{AccessPoint, Station};
use crate::error::EngineError;

/// An AP picked from a scan, remembered by position and address.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug)]
pub struct SelectedAp {
    pub index: usize,
    pub bssid: MacAddress,
}

impl SelectedAp {
    pub fn new(index: usize, ap: &AccessPoint) -> Self {
        SelectedAp {
            index,
            bssid: ap.bssid,
        }
    }

    /// Look the AP up again in `aps`. Fails if the slot now holds a
    /// different BSSID, which happens when a rescan reorders results.
    pub fn resolve<'a>(&self, aps: &'a [AccessPoint]) -> Result<&'a AccessPoint, EngineError> {
        match aps.get(self.index) {
            Some(ap) if ap.bssid == self.bssid => Ok(ap),
            Some(_) => Err(EngineError::invalid_target(format!(
                "AP {} moved, rescan and select again",
                self.bssid
            ))),
            None => Err(EngineError::invalid_target(format!(
                "AP {} is no longer in the scan results",
                self.bssid
            ))),
        }
    }
}

/// What the next attack is aimed at.
#[derive(Eq, PartialEq, Clone, Debug, Default)]
pub enum TargetSelection {
    #[default]
    None,
    SingleAp(SelectedAp),
    /// The first entry is the primary target.
    MultiAp(Vec<SelectedAp>),
    Station(Station),
}

impl TargetSelection {
    pub fn is_none(&self) -> bool {
        matches!(self, TargetSelection::None)
    }

    pub fn primary(&self) -> Option<SelectedAp> {
        match self {
            TargetSelection::SingleAp(ap) => Some(*ap),
            TargetSelection::MultiAp(aps) => aps.first().copied(),
            _ => None,
        }
    }

    pub fn selected_aps(&self) -> Vec<SelectedAp> {
        match self {
            TargetSelection::SingleAp(ap) => vec![*ap],
            TargetSelection::MultiAp(aps) => aps.clone(),
            _ => Vec::new(),
        }
    }

    pub fn station(&self) -> Option<Station> {
        match self {
            TargetSelection::Station(station) => Some(*station),
            _ => None,
        }
    }

    /// Resolve every selected AP against `aps`.
    pub fn resolve<'a>(&self, aps: &'a [AccessPoint]) -> Result<Vec<&'a AccessPoint>, EngineError> {
        self.selected_aps()
            .iter()
            .map(|selected| selected.resolve(aps))
            .collect()
    }
}
