use super::{FrameControl, MacAddress, SequenceControl};
use crate::traits::Addresses;

/// Header shared by all management frames.
///
/// | bytes | field            |
/// |-------|------------------|
/// | 0-1   | frame control    |
/// | 2-3   | duration         |
/// | 4-9   | address 1        |
/// | 10-15 | address 2        |
/// | 16-21 | address 3        |
/// | 22-23 | sequence control |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagementHeader {
    pub frame_control: FrameControl,
    pub duration: [u8; 2],
    pub address_1: MacAddress,
    pub address_2: MacAddress,
    pub address_3: MacAddress,
    pub sequence_control: SequenceControl,
}

impl ManagementHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(crate::MANAGEMENT_HEADER_LEN);
        bytes.extend_from_slice(&self.frame_control.encode());
        bytes.extend_from_slice(&self.duration);
        bytes.extend_from_slice(&self.address_1.encode());
        bytes.extend_from_slice(&self.address_2.encode());
        bytes.extend_from_slice(&self.address_3.encode());
        bytes.extend_from_slice(&self.sequence_control.encode());
        bytes
    }
}

/// Management frames never set both DS bits, so address 1 is the receiver,
/// address 2 the transmitter and address 3 the BSSID unless a DS bit says
/// otherwise.
impl Addresses for ManagementHeader {
    fn src(&self) -> Option<&MacAddress> {
        let frame_control = &self.frame_control;
        if frame_control.to_ds() {
            Some(&self.address_3)
        } else if frame_control.from_ds() {
            Some(&self.address_1)
        } else {
            Some(&self.address_2)
        }
    }

    fn dest(&self) -> &MacAddress {
        let frame_control = &self.frame_control;
        if frame_control.to_ds() {
            &self.address_2
        } else if frame_control.from_ds() {
            &self.address_3
        } else {
            &self.address_1
        }
    }

    fn bssid(&self) -> Option<&MacAddress> {
        let frame_control = &self.frame_control;
        if frame_control.to_ds() {
            Some(&self.address_1)
        } else if frame_control.from_ds() {
            Some(&self.address_2)
        } else {
            Some(&self.address_3)
        }
    }
}
