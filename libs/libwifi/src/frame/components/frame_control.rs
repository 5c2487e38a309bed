use crate::frame_types::*;

#[inline]
fn flag_is_set(data: u8, bit: u8) -> bool {
    data & (1 << bit) > 0
}

/// The first two bytes of every frame.
///
/// First byte: protocol version (bits 0-1), [FrameType] (bits 2-3) and
/// [FrameSubType] (bits 4-7).
///
/// Second byte holds the flags: `to_ds`, `from_ds`, `more_frag`, `retry`,
/// `power_mgmt`, `more_data`, `protected` and `order` from bit 0 upwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameControl {
    pub protocol_version: u8,
    pub frame_type: FrameType,
    pub frame_subtype: FrameSubType,
    pub flags: u8,
}

impl FrameControl {
    /// Frame control of an unfragmented management frame without flags.
    pub fn management(frame_subtype: FrameSubType) -> Self {
        FrameControl {
            protocol_version: 0,
            frame_type: FrameType::Management,
            frame_subtype,
            flags: 0,
        }
    }

    pub fn to_ds(&self) -> bool {
        flag_is_set(self.flags, 0)
    }

    pub fn from_ds(&self) -> bool {
        flag_is_set(self.flags, 1)
    }

    pub fn more_frag(&self) -> bool {
        flag_is_set(self.flags, 2)
    }

    pub fn retry(&self) -> bool {
        flag_is_set(self.flags, 3)
    }

    pub fn pwr_mgmt(&self) -> bool {
        flag_is_set(self.flags, 4)
    }

    pub fn more_data(&self) -> bool {
        flag_is_set(self.flags, 5)
    }

    pub fn protected(&self) -> bool {
        flag_is_set(self.flags, 6)
    }

    pub fn order(&self) -> bool {
        flag_is_set(self.flags, 7)
    }

    pub fn encode(&self) -> [u8; 2] {
        let protocol_version_bits = self.protocol_version & 0b11;
        let frame_type_bits = (self.frame_type.to_bits() & 0b11) << 2;
        let frame_subtype_bits = (self.frame_subtype.to_bytes() & 0b1111) << 4;

        [
            frame_subtype_bits | frame_type_bits | protocol_version_bits,
            self.flags,
        ]
    }
}
