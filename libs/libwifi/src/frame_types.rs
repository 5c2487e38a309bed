use strum_macros::Display;

/// The two bit frame type of the frame control field.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display)]
pub enum FrameType {
    Management,
    Control,
    Data,
    Unknown,
}

impl FrameType {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => FrameType::Management,
            1 => FrameType::Control,
            2 => FrameType::Data,
            _ => FrameType::Unknown,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            FrameType::Management => 0,
            FrameType::Control => 1,
            FrameType::Data => 2,
            FrameType::Unknown => 3,
        }
    }
}

/// Frame subtypes. Management subtypes are listed individually, everything
/// else collapses into [FrameSubType::Other] with its raw four bits.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display)]
pub enum FrameSubType {
    AssociationRequest,
    AssociationResponse,
    ReassociationRequest,
    ReassociationResponse,
    ProbeRequest,
    ProbeResponse,
    TimingAdvertisement,
    Beacon,
    Atim,
    Disassociation,
    Authentication,
    Deauthentication,
    Action,
    ActionNoAck,
    Reserved,
    Other(u8),
}

impl FrameSubType {
    /// Decode the subtype bits for the given frame type.
    pub fn from_bits(frame_type: FrameType, bits: u8) -> Self {
        if frame_type != FrameType::Management {
            return FrameSubType::Other(bits & 0x0f);
        }
        match bits {
            0 => FrameSubType::AssociationRequest,
            1 => FrameSubType::AssociationResponse,
            2 => FrameSubType::ReassociationRequest,
            3 => FrameSubType::ReassociationResponse,
            4 => FrameSubType::ProbeRequest,
            5 => FrameSubType::ProbeResponse,
            6 => FrameSubType::TimingAdvertisement,
            8 => FrameSubType::Beacon,
            9 => FrameSubType::Atim,
            10 => FrameSubType::Disassociation,
            11 => FrameSubType::Authentication,
            12 => FrameSubType::Deauthentication,
            13 => FrameSubType::Action,
            14 => FrameSubType::ActionNoAck,
            _ => FrameSubType::Reserved,
        }
    }

    /// The four subtype bits.
    pub fn to_bytes(&self) -> u8 {
        match self {
            FrameSubType::AssociationRequest => 0,
            FrameSubType::AssociationResponse => 1,
            FrameSubType::ReassociationRequest => 2,
            FrameSubType::ReassociationResponse => 3,
            FrameSubType::ProbeRequest => 4,
            FrameSubType::ProbeResponse => 5,
            FrameSubType::TimingAdvertisement => 6,
            FrameSubType::Beacon => 8,
            FrameSubType::Atim => 9,
            FrameSubType::Disassociation => 10,
            FrameSubType::Authentication => 11,
            FrameSubType::Deauthentication => 12,
            FrameSubType::Action => 13,
            FrameSubType::ActionNoAck => 14,
            FrameSubType::Reserved => 15,
            FrameSubType::Other(bits) => *bits & 0x0f,
        }
    }
}
