use std::fmt;

use rand::{thread_rng, RngCore};

/// A six byte IEEE 802 MAC address.
///
/// ```
/// use libwifi::frame::components::MacAddress;
///
/// let address = MacAddress([255, 255, 255, 255, 255, 255]);
/// assert!(address.is_broadcast());
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Copy, Ord, PartialOrd, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn from_vec(vec: Vec<u8>) -> Option<MacAddress> {
        Self::from_slice(&vec)
    }

    pub fn from_slice(slice: &[u8]) -> Option<MacAddress> {
        <[u8; 6]>::try_from(slice).ok().map(MacAddress)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
    }

    /// Colon separated upper case representation, `AA:BB:CC:DD:EE:FF`.
    pub fn to_long_string(&self) -> String {
        format!(
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        )
    }

    /// Random unicast address that passes [MacAddress::is_real_device].
    pub fn random() -> Self {
        loop {
            let mac = MacAddress(random_bytes());
            if mac.is_real_device() {
                return mac;
            }
        }
    }

    /// Derive a locally administered unicast address from `base`, keeping
    /// bytes 1-3 and randomizing the last two.
    pub fn locally_administered_from(base: &MacAddress) -> Self {
        let mut bytes = base.0;
        let tail = random_bytes();
        bytes[0] = (bytes[0] | 0x02) & 0xFE;
        bytes[4] = tail[4];
        bytes[5] = tail[5];
        MacAddress(bytes)
    }

    pub fn broadcast() -> Self {
        MacAddress([255, 255, 255, 255, 255, 255])
    }

    pub fn zeroed() -> Self {
        MacAddress([0, 0, 0, 0, 0, 0])
    }

    pub fn encode(&self) -> [u8; 6] {
        self.0
    }

    /// Locally administered bit.
    pub fn is_private(&self) -> bool {
        self.0[0] & 0x02 != 0
    }

    /// Group bit, set for broadcast and every multicast address.
    pub fn is_mcast(&self) -> bool {
        self.0[0] & 0x01 == 1
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [255, 255, 255, 255, 255, 255]
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// 01:80:c2::/24, spanning tree and other bridge group addresses.
    pub fn is_groupcast(&self) -> bool {
        self.0[0] == 1 && self.0[1] == 128 && self.0[2] == 194
    }

    /// 01:00:5e::/24, reserved for IPv4 multicast.
    pub fn is_ipv4_multicast(&self) -> bool {
        self.0[0] == 1 && self.0[1] == 0 && self.0[2] == 94
    }

    /// 33:33::/16, reserved for IPv6 multicast.
    pub fn is_ipv6_multicast(&self) -> bool {
        self.0[0] == 51 && self.0[1] == 51
    }

    /// Whether the address can belong to an actual station rather than a
    /// broadcast or multicast group.
    pub fn is_real_device(&self) -> bool {
        !(self.is_broadcast()
            || self.is_mcast()
            || self.is_ipv4_multicast()
            || self.is_ipv6_multicast()
            || self.is_groupcast()
            || self.is_zero())
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, thiserror::Error)]
pub enum MacParseError {
    #[error("mac address contains an invalid hex digit")]
    InvalidDigit,
    #[error("mac address must have six octets")]
    InvalidLength,
}

impl std::str::FromStr for MacAddress {
    type Err = MacParseError;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` and `aabbccddeeff`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let octets: Vec<&str> = if input.contains(':') {
            input.split(':').collect()
        } else if input.contains('-') {
            input.split('-').collect()
        } else if input.len() == 12 && input.is_ascii() {
            (0..12).step_by(2).map(|i| &input[i..i + 2]).collect()
        } else {
            return Err(MacParseError::InvalidLength);
        };

        if octets.len() != 6 {
            return Err(MacParseError::InvalidLength);
        }

        let mut array = [0u8; 6];
        for (slot, octet) in array.iter_mut().zip(octets) {
            if octet.len() != 2 {
                return Err(MacParseError::InvalidDigit);
            }
            *slot = u8::from_str_radix(octet, 16).map_err(|_| MacParseError::InvalidDigit)?;
        }

        Ok(MacAddress(array))
    }
}

fn random_bytes() -> [u8; 6] {
    let mut bytes = [0u8; 6];
    thread_rng().fill_bytes(&mut bytes);
    bytes
}
