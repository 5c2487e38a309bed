use nom::bytes::complete::take;
use nom::number::complete::{le_u16, le_u64, le_u8};
use nom::sequence::tuple;

use crate::error::Error;
use crate::frame::components::FrameControl;
use crate::frame::*;
use crate::parsers::{parse_management_header, parse_station_info};

/// Parse a [Beacon] frame.
///
/// - ManagementHeader
/// - Timestamp
/// - Beacon interval
/// - Capability info
/// - Tagged elements
pub fn parse_beacon(frame_control: FrameControl, input: &[u8]) -> Result<Frame, Error> {
    let (input, header) = parse_management_header(frame_control, input)?;
    let (_, (timestamp, beacon_interval, capability_info, station_info)) =
        tuple((le_u64, le_u16, le_u16, parse_station_info))(input)?;

    Ok(Frame::Beacon(Beacon {
        header,
        timestamp,
        beacon_interval,
        capability_info,
        station_info,
    }))
}

/// Parse a [ProbeRequest] frame: header followed by tagged elements.
pub fn parse_probe_request(frame_control: FrameControl, input: &[u8]) -> Result<Frame, Error> {
    let (input, header) = parse_management_header(frame_control, input)?;
    let (_, station_info) = parse_station_info(input)?;

    Ok(Frame::ProbeRequest(ProbeRequest {
        header,
        station_info,
    }))
}

/// Parse a [ProbeResponse] frame. The layout matches [parse_beacon].
pub fn parse_probe_response(frame_control: FrameControl, input: &[u8]) -> Result<Frame, Error> {
    let (input, header) = parse_management_header(frame_control, input)?;
    let (_, (timestamp, beacon_interval, capability_info, station_info)) =
        tuple((le_u64, le_u16, le_u16, parse_station_info))(input)?;

    Ok(Frame::ProbeResponse(ProbeResponse {
        header,
        timestamp,
        beacon_interval,
        capability_info,
        station_info,
    }))
}

/// Parse an [Authentication] frame.
///
/// - ManagementHeader
/// - Authentication algorithm
/// - Transaction sequence
/// - Status code
/// - Challenge text element (shared key) or SAE commit fields
pub fn parse_authentication_frame(
    frame_control: FrameControl,
    input: &[u8],
) -> Result<Frame, Error> {
    let (input, header) = parse_management_header(frame_control, input)?;
    let (input, (auth_algorithm, auth_seq, status_code)) =
        tuple((le_u16, le_u16, le_u16))(input)?;

    let mut challenge_text = None;
    let mut sae_commit = None;

    if auth_algorithm == AUTH_ALGORITHM_SHARED_KEY && (auth_seq == 2 || auth_seq == 3) {
        if input.len() >= 2 {
            let (input, (_element_id, length)) = tuple((le_u8, le_u8))(input)?;
            let (_, text) = take(length)(input)?;
            challenge_text = Some(text.to_vec());
        }
    } else if auth_algorithm == AUTH_ALGORITHM_SAE && auth_seq == 1 && input.len() >= 2 {
        sae_commit = Some(parse_sae_commit(status_code, input)?);
    }

    Ok(Frame::Authentication(Authentication {
        header,
        auth_algorithm,
        auth_seq,
        status_code,
        challenge_text,
        sae_commit,
    }))
}

/// Split an SAE commit body.
///
/// With status 76 everything after the group is the anti-clogging token.
/// Otherwise a group 19 scalar and element are expected, and trailing bytes
/// are read as an appended token.
fn parse_sae_commit(status_code: u16, input: &[u8]) -> Result<SaeCommit, Error> {
    let (rest, group_id) = le_u16(input)?;

    if status_code == STATUS_ANTI_CLOGGING_TOKEN_REQUIRED {
        return Ok(SaeCommit {
            group_id,
            anti_clogging_token: Some(rest.to_vec()),
            ..Default::default()
        });
    }

    let fixed = SAE_SCALAR_LEN + SAE_ELEMENT_LEN;
    if rest.len() < fixed {
        return Ok(SaeCommit {
            group_id,
            ..Default::default()
        });
    }

    Ok(SaeCommit {
        group_id,
        scalar: rest[..SAE_SCALAR_LEN].to_vec(),
        element: rest[SAE_SCALAR_LEN..fixed].to_vec(),
        anti_clogging_token: (rest.len() > fixed).then(|| rest[fixed..].to_vec()),
    })
}

/// Parse a [Deauthentication] frame: header and a reason code.
pub fn parse_deauthentication_frame(
    frame_control: FrameControl,
    input: &[u8],
) -> Result<Frame, Error> {
    let (input, header) = parse_management_header(frame_control, input)?;
    let (_, reason_code) = le_u16(input)?;

    Ok(Frame::Deauthentication(Deauthentication {
        header,
        reason_code: DeauthenticationReason::from_code(reason_code),
    }))
}

/// Parse a [Disassociation] frame: header and a reason code.
pub fn parse_disassociation_frame(
    frame_control: FrameControl,
    input: &[u8],
) -> Result<Frame, Error> {
    let (input, header) = parse_management_header(frame_control, input)?;
    let (_, reason_code) = le_u16(input)?;

    Ok(Frame::Disassociation(Disassociation {
        header,
        reason_code: DeauthenticationReason::from_code(reason_code),
    }))
}
