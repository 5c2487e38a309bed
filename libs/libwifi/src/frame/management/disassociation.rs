use libwifi_macros::AddressHeader;

use super::DeauthenticationReason;
use crate::frame::components::*;

/// Disassociation shares the deauthentication body: a single reason code.
#[derive(Clone, Debug, AddressHeader)]
pub struct Disassociation {
    pub header: ManagementHeader,
    pub reason_code: DeauthenticationReason,
}

impl Disassociation {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.header.encode();
        bytes.extend_from_slice(&self.reason_code.code().to_le_bytes());
        bytes
    }
}
