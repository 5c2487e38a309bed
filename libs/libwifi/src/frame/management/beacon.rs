use libwifi_macros::AddressHeader;

use crate::frame::components::*;

#[derive(Clone, Debug, AddressHeader)]
pub struct Beacon {
    pub header: ManagementHeader,
    pub timestamp: u64,
    /// Time units (1024 µs) between beacons.
    pub beacon_interval: u16,
    pub capability_info: u16,
    pub station_info: StationInfo,
}

impl Beacon {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.header.encode();
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.beacon_interval.to_le_bytes());
        bytes.extend_from_slice(&self.capability_info.to_le_bytes());
        bytes.extend(self.station_info.encode());
        bytes
    }
}
