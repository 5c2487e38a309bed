/// Tagged information elements carried in the body of beacons, probe
/// requests and probe responses.
///
/// Elements the engine cares about get their own field, everything else is
/// kept verbatim in `data` so frames re-encode without loss.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StationInfo {
    pub ssid: Option<String>,
    /// Raw length of the SSID element, which may differ from `ssid.len()`
    /// for hidden networks that send zeroed SSIDs.
    pub ssid_length: Option<usize>,
    /// Supported rates in 500 kbit/s units, basic rates have bit 7 set.
    pub supported_rates: Vec<u8>,
    pub ds_parameter_set: Option<u8>,
    pub rsn_information: Option<RsnInformation>,
    /// True when a WPA1 vendor element (00:50:f2 type 1) is present.
    pub wpa_present: bool,
    pub vendor_specific: Vec<VendorSpecificInfo>,
    pub data: Vec<(u8, Vec<u8>)>,
}

impl StationInfo {
    pub const SSID_ID: u8 = 0;
    pub const RATES_ID: u8 = 1;
    pub const DS_PARAMETER_ID: u8 = 3;
    pub const RSN_ID: u8 = 48;
    pub const VENDOR_ID: u8 = 221;

    /// The SSID unless it is empty or hidden behind null bytes.
    pub fn visible_ssid(&self) -> Option<&str> {
        self.ssid
            .as_deref()
            .filter(|ssid| !ssid.is_empty() && !ssid.chars().all(|c| c == '\0'))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        if let Some(ssid) = &self.ssid {
            push_element(&mut bytes, Self::SSID_ID, ssid.as_bytes());
        }

        if !self.supported_rates.is_empty() {
            push_element(&mut bytes, Self::RATES_ID, &self.supported_rates);
        }

        if let Some(channel) = self.ds_parameter_set {
            push_element(&mut bytes, Self::DS_PARAMETER_ID, &[channel]);
        }

        if let Some(rsn) = &self.rsn_information {
            push_element(&mut bytes, Self::RSN_ID, &rsn.encode());
        }

        for vendor_info in &self.vendor_specific {
            let mut body = Vec::with_capacity(4 + vendor_info.data.len());
            body.extend_from_slice(&vendor_info.oui);
            body.push(vendor_info.oui_type);
            body.extend_from_slice(&vendor_info.data);
            push_element(&mut bytes, Self::VENDOR_ID, &body);
        }

        for (id, data) in &self.data {
            push_element(&mut bytes, *id, data);
        }

        bytes
    }
}

/// Elements are limited to 255 bytes of payload, longer input is truncated.
fn push_element(bytes: &mut Vec<u8>, id: u8, data: &[u8]) {
    let data = &data[..data.len().min(u8::MAX as usize)];
    bytes.push(id);
    bytes.push(data.len() as u8);
    bytes.extend_from_slice(data);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VendorSpecificInfo {
    pub oui: [u8; 3],
    pub oui_type: u8,
    pub data: Vec<u8>,
}

/// The parts of the RSN element needed to classify a network's security.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsnInformation {
    pub version: u16,
    pub group_cipher_suite: [u8; 4],
    pub pairwise_cipher_suites: Vec<[u8; 4]>,
    pub akm_suites: Vec<RsnAkmSuite>,
    pub capabilities: u16,
}

impl RsnInformation {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.group_cipher_suite);
        bytes.extend_from_slice(&(self.pairwise_cipher_suites.len() as u16).to_le_bytes());
        for suite in &self.pairwise_cipher_suites {
            bytes.extend_from_slice(suite);
        }
        bytes.extend_from_slice(&(self.akm_suites.len() as u16).to_le_bytes());
        for akm in &self.akm_suites {
            bytes.extend_from_slice(&[0x00, 0x0f, 0xac, akm.suite_type()]);
        }
        bytes.extend_from_slice(&self.capabilities.to_le_bytes());
        bytes
    }

    pub fn has_akm(&self, wanted: RsnAkmSuite) -> bool {
        self.akm_suites.contains(&wanted)
    }
}

/// AKM suites under the 00:0f:ac OUI.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RsnAkmSuite {
    Eap,
    Psk,
    FtEap,
    FtPsk,
    EapSha256,
    PskSha256,
    Sae,
    FtSae,
    SuiteBEap192,
    Owe,
    Unknown(u8),
}

impl RsnAkmSuite {
    pub fn from_suite_type(suite_type: u8) -> Self {
        match suite_type {
            1 => RsnAkmSuite::Eap,
            2 => RsnAkmSuite::Psk,
            3 => RsnAkmSuite::FtEap,
            4 => RsnAkmSuite::FtPsk,
            5 => RsnAkmSuite::EapSha256,
            6 => RsnAkmSuite::PskSha256,
            8 => RsnAkmSuite::Sae,
            9 => RsnAkmSuite::FtSae,
            12 => RsnAkmSuite::SuiteBEap192,
            18 => RsnAkmSuite::Owe,
            other => RsnAkmSuite::Unknown(other),
        }
    }

    pub fn suite_type(&self) -> u8 {
        match self {
            RsnAkmSuite::Eap => 1,
            RsnAkmSuite::Psk => 2,
            RsnAkmSuite::FtEap => 3,
            RsnAkmSuite::FtPsk => 4,
            RsnAkmSuite::EapSha256 => 5,
            RsnAkmSuite::PskSha256 => 6,
            RsnAkmSuite::Sae => 8,
            RsnAkmSuite::FtSae => 9,
            RsnAkmSuite::SuiteBEap192 => 12,
            RsnAkmSuite::Owe => 18,
            RsnAkmSuite::Unknown(other) => *other,
        }
    }
}
