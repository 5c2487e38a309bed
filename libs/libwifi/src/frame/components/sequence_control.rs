use rand::Rng;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SequenceControl {
    /// The 4 bit fragment number.
    pub fragment_number: u8,
    /// The 12 bit sequence number.
    pub sequence_number: u16,
}

impl SequenceControl {
    /// Sequence control with a random 12 bit sequence number and fragment 0.
    pub fn random() -> Self {
        SequenceControl {
            fragment_number: 0,
            sequence_number: rand::thread_rng().gen_range(0..0x1000),
        }
    }

    pub fn new(sequence_number: u16) -> Self {
        SequenceControl {
            fragment_number: 0,
            sequence_number: sequence_number & 0x0FFF,
        }
    }

    pub fn encode(&self) -> [u8; 2] {
        let combined = ((self.sequence_number & 0x0FFF) << 4) | (self.fragment_number & 0x0F) as u16;
        combined.to_le_bytes()
    }
}
