use nom::number::complete::le_u16;
use nom::IResult;

use crate::frame::components::SequenceControl;

/// Sequence control is a little endian u16, fragment in the low nibble.
pub fn parse_sequence_control(input: &[u8]) -> IResult<&[u8], SequenceControl> {
    let (remaining, raw) = le_u16(input)?;

    Ok((
        remaining,
        SequenceControl {
            fragment_number: (raw & 0x000F) as u8,
            sequence_number: raw >> 4,
        },
    ))
}
