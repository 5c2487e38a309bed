use libwifi_macros::AddressHeader;

use crate::frame::components::*;

/// Open system authentication.
pub const AUTH_ALGORITHM_OPEN: u16 = 0;
/// Shared key authentication, carries a challenge text.
pub const AUTH_ALGORITHM_SHARED_KEY: u16 = 1;
/// Simultaneous Authentication of Equals.
pub const AUTH_ALGORITHM_SAE: u16 = 3;

/// The AP demands an anti-clogging token before it accepts a commit.
pub const STATUS_ANTI_CLOGGING_TOKEN_REQUIRED: u16 = 76;

/// Scalar length for SAE group 19 (NIST P-256).
pub const SAE_SCALAR_LEN: usize = 32;
/// Element length for SAE group 19, uncompressed `x || y`.
pub const SAE_ELEMENT_LEN: usize = 64;

#[derive(Clone, Debug, AddressHeader)]
pub struct Authentication {
    pub header: ManagementHeader,
    pub auth_algorithm: u16,
    pub auth_seq: u16,
    pub status_code: u16,
    pub challenge_text: Option<Vec<u8>>,
    /// Present on SAE commit messages (algorithm 3, transaction 1).
    pub sae_commit: Option<SaeCommit>,
}

impl Authentication {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.header.encode();
        bytes.extend_from_slice(&self.auth_algorithm.to_le_bytes());
        bytes.extend_from_slice(&self.auth_seq.to_le_bytes());
        bytes.extend_from_slice(&self.status_code.to_le_bytes());

        if let Some(text) = &self.challenge_text {
            bytes.push(16);
            bytes.push(text.len().min(u8::MAX as usize) as u8);
            bytes.extend_from_slice(&text[..text.len().min(u8::MAX as usize)]);
        }

        if let Some(commit) = &self.sae_commit {
            bytes.extend(commit.encode());
        }

        bytes
    }

    pub fn is_sae_commit(&self) -> bool {
        self.auth_algorithm == AUTH_ALGORITHM_SAE && self.auth_seq == 1
    }
}

/// Body of an SAE commit message.
///
/// Outgoing commits are laid out as `group || scalar || element || token`.
/// A status 76 response from the AP carries only `group || token`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaeCommit {
    pub group_id: u16,
    pub scalar: Vec<u8>,
    pub element: Vec<u8>,
    pub anti_clogging_token: Option<Vec<u8>>,
}

impl SaeCommit {
    pub fn encode(&self) -> Vec<u8> {
        let token_len = self.anti_clogging_token.as_ref().map_or(0, Vec::len);
        let mut bytes = Vec::with_capacity(2 + self.scalar.len() + self.element.len() + token_len);
        bytes.extend_from_slice(&self.group_id.to_le_bytes());
        bytes.extend_from_slice(&self.scalar);
        bytes.extend_from_slice(&self.element);
        if let Some(token) = &self.anti_clogging_token {
            bytes.extend_from_slice(token);
        }
        bytes
    }
}

#[derive(Clone, Debug, AddressHeader)]
pub struct Deauthentication {
    pub header: ManagementHeader,
    pub reason_code: DeauthenticationReason,
}

impl Deauthentication {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.header.encode();
        bytes.extend_from_slice(&self.reason_code.code().to_le_bytes());
        bytes
    }
}

/// Reason codes carried by deauthentication and disassociation frames.
#[derive(Copy, Debug, PartialEq, Eq, Clone)]
pub enum DeauthenticationReason {
    UnspecifiedReason,
    PreviousAuthenticationNoLongerValid,
    DeauthenticatedBecauseSTAIsLeaving,
    DisassociatedDueToInactivity,
    DisassociatedBecauseAPUnableToHandleAllSTAs,
    Class2FrameReceivedFromNonauthenticatedSTA,
    Class3FrameReceivedFromNonassociatedSTA,
    DisassociatedBecauseSTALeavingBSS,
    STARequestingReassociationNotAuthenticated,
    MICFailure,
    FourWayHandshakeTimeout,
    IEEE8021XAuthenticationFailed,
    Other(u16),
}

impl DeauthenticationReason {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => DeauthenticationReason::UnspecifiedReason,
            2 => DeauthenticationReason::PreviousAuthenticationNoLongerValid,
            3 => DeauthenticationReason::DeauthenticatedBecauseSTAIsLeaving,
            4 => DeauthenticationReason::DisassociatedDueToInactivity,
            5 => DeauthenticationReason::DisassociatedBecauseAPUnableToHandleAllSTAs,
            6 => DeauthenticationReason::Class2FrameReceivedFromNonauthenticatedSTA,
            7 => DeauthenticationReason::Class3FrameReceivedFromNonassociatedSTA,
            8 => DeauthenticationReason::DisassociatedBecauseSTALeavingBSS,
            9 => DeauthenticationReason::STARequestingReassociationNotAuthenticated,
            14 => DeauthenticationReason::MICFailure,
            15 => DeauthenticationReason::FourWayHandshakeTimeout,
            23 => DeauthenticationReason::IEEE8021XAuthenticationFailed,
            other => DeauthenticationReason::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            DeauthenticationReason::UnspecifiedReason => 1,
            DeauthenticationReason::PreviousAuthenticationNoLongerValid => 2,
            DeauthenticationReason::DeauthenticatedBecauseSTAIsLeaving => 3,
            DeauthenticationReason::DisassociatedDueToInactivity => 4,
            DeauthenticationReason::DisassociatedBecauseAPUnableToHandleAllSTAs => 5,
            DeauthenticationReason::Class2FrameReceivedFromNonauthenticatedSTA => 6,
            DeauthenticationReason::Class3FrameReceivedFromNonassociatedSTA => 7,
            DeauthenticationReason::DisassociatedBecauseSTALeavingBSS => 8,
            DeauthenticationReason::STARequestingReassociationNotAuthenticated => 9,
            DeauthenticationReason::MICFailure => 14,
            DeauthenticationReason::FourWayHandshakeTimeout => 15,
            DeauthenticationReason::IEEE8021XAuthenticationFailed => 23,
            DeauthenticationReason::Other(code) => *code,
        }
    }
}
