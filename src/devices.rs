use std::fmt;

use libwifi::frame::components::{MacAddress, RsnAkmSuite, StationInfo};
use strum_macros::{Display, EnumString};

/// Security of an access point as reported by a scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, Default)]
pub enum AuthMode {
    #[default]
    Open,
    Wep,
    WpaPsk,
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa2Enterprise,
    Wpa3Psk,
    Wpa2Wpa3Psk,
    Wpa3Enterprise,
    Owe,
    Unknown,
}

impl AuthMode {
    /// Networks that accept SAE authentication.
    pub fn supports_sae(&self) -> bool {
        matches!(
            self,
            AuthMode::Wpa3Psk | AuthMode::Wpa2Wpa3Psk | AuthMode::Wpa3Enterprise
        )
    }

    /// Classify a network from its beacon elements and the privacy bit of
    /// the capability field.
    pub fn from_station_info(info: &StationInfo, privacy: bool) -> Self {
        if let Some(rsn) = &info.rsn_information {
            let sae = rsn.has_akm(RsnAkmSuite::Sae) || rsn.has_akm(RsnAkmSuite::FtSae);
            let psk = rsn.has_akm(RsnAkmSuite::Psk)
                || rsn.has_akm(RsnAkmSuite::PskSha256)
                || rsn.has_akm(RsnAkmSuite::FtPsk);
            let suite_b = rsn.has_akm(RsnAkmSuite::SuiteBEap192);
            let eap = rsn.has_akm(RsnAkmSuite::Eap)
                || rsn.has_akm(RsnAkmSuite::EapSha256)
                || rsn.has_akm(RsnAkmSuite::FtEap);

            return match (sae, psk) {
                (true, true) => AuthMode::Wpa2Wpa3Psk,
                (true, false) => AuthMode::Wpa3Psk,
                _ if suite_b => AuthMode::Wpa3Enterprise,
                _ if rsn.has_akm(RsnAkmSuite::Owe) => AuthMode::Owe,
                (false, true) if info.wpa_present => AuthMode::WpaWpa2Psk,
                (false, true) => AuthMode::Wpa2Psk,
                _ if eap => AuthMode::Wpa2Enterprise,
                _ => AuthMode::Unknown,
            };
        }

        if info.wpa_present {
            AuthMode::WpaPsk
        } else if privacy {
            AuthMode::Wep
        } else {
            AuthMode::Open
        }
    }
}

/// A scanned access point. Records are snapshots and are never edited after
/// the scan that produced them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessPoint {
    pub bssid: MacAddress,
    pub ssid: String,
    pub channel: u8,
    pub rssi: i8,
    pub auth_mode: AuthMode,
}

impl AccessPoint {
    pub fn new(bssid: MacAddress, ssid: impl Into<String>, channel: u8, rssi: i8) -> Self {
        AccessPoint {
            bssid,
            ssid: ssid.into(),
            channel,
            rssi,
            auth_mode: AuthMode::Open,
        }
    }

    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    /// Key handed to the vendor lookup.
    pub fn vendor_key(&self) -> String {
        self.bssid.to_long_string()
    }

    pub fn is_hidden(&self) -> bool {
        self.ssid.is_empty()
    }

    pub fn display_ssid(&self) -> &str {
        if self.is_hidden() {
            "(Hidden)"
        } else {
            &self.ssid
        }
    }
}

impl fmt::Display for AccessPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<32} {} ch {:>3} {:>4} dBm {}",
            self.display_ssid(),
            self.bssid.to_long_string(),
            self.channel,
            self.rssi,
            self.auth_mode
        )
    }
}

/// A station seen talking to a scanned access point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Station {
    pub mac: MacAddress,
    pub bssid: MacAddress,
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.mac.to_long_string(),
            self.bssid.to_long_string()
        )
    }
}
