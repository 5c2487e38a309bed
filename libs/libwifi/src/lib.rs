//! Parsing and encoding of the IEEE 802.11 management frames used by the
//! wifi_oxide engine.
//!
//! Only management frames are modelled. Other frame types still yield a
//! parsed [FrameControl](frame::components::FrameControl) through
//! [Error::UnhandledFrameSubtype].

/// Libwifi's own [Error](error::Error) implementation
pub mod error;
/// The [Frame](frame::Frame) enum and all frame structs.
pub mod frame;
/// Enums representing frame types and frame subtypes.
mod frame_types;
/// [nom] parsers for the frame structs.
pub mod parsers;
/// All traits used or provided by this library.
mod traits;

use crate::error::Error;
use crate::parsers::*;

pub use crate::frame::Frame;
pub use crate::frame_types::*;
pub use crate::traits::*;

use crc::{Crc, CRC_32_ISO_HDLC};

// CRC algorithm for FCS calculation
const CRC_32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Length of a management header including frame control.
pub const MANAGEMENT_HEADER_LEN: usize = 24;

/// Parse an IEEE 802.11 management frame from raw bytes.
///
/// When `fcs_included` is set, the trailing four bytes are checked against
/// the CRC of the frame and stripped before parsing.
pub fn parse_frame(input: &[u8], fcs_included: bool) -> Result<Frame, Error> {
    let input = if fcs_included {
        strip_fcs(input)?
    } else {
        input
    };

    let (input, frame_control) = parse_frame_control(input)?;

    match frame_control.frame_subtype {
        FrameSubType::Beacon => parse_beacon(frame_control, input),
        FrameSubType::ProbeRequest => parse_probe_request(frame_control, input),
        FrameSubType::ProbeResponse => parse_probe_response(frame_control, input),
        FrameSubType::Authentication => parse_authentication_frame(frame_control, input),
        FrameSubType::Deauthentication => parse_deauthentication_frame(frame_control, input),
        FrameSubType::Disassociation => parse_disassociation_frame(frame_control, input),
        _ => Err(Error::UnhandledFrameSubtype(frame_control, input.to_vec())),
    }
}

/// Verify and remove the frame check sequence.
pub fn strip_fcs(input: &[u8]) -> Result<&[u8], Error> {
    if input.len() < 4 {
        return Err(Error::Incomplete("Frame is shorter than its FCS".to_string()));
    }

    let (frame_data, fcs_bytes) = input.split_at(input.len() - 4);
    let crc = CRC_32.checksum(frame_data);
    let fcs = u32::from_le_bytes([fcs_bytes[0], fcs_bytes[1], fcs_bytes[2], fcs_bytes[3]]);

    if crc != fcs {
        return Err(Error::Incomplete(format!(
            "(FCS) mismatch {:02x} {:02x}",
            crc, fcs
        )));
    }
    Ok(frame_data)
}

/// Compute the FCS of an encoded frame, little endian, ready to append.
pub fn frame_check_sequence(frame: &[u8]) -> [u8; 4] {
    CRC_32.checksum(frame).to_le_bytes()
}
