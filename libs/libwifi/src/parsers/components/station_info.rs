use nom::bytes::complete::take;
use nom::number::complete::{le_u16, u8 as get_u8};
use nom::sequence::tuple;
use nom::IResult;

use super::clone_slice;
use crate::frame::components::{RsnAkmSuite, RsnInformation, StationInfo, VendorSpecificInfo};

const MICROSOFT_OUI: [u8; 3] = [0x00, 0x50, 0xf2];

/// Parse the tagged elements of a management frame body.
///
/// Each element is `id (1) | length (1) | data (length)`. Parsing stops
/// cleanly at the end of input; a truncated trailing element is dropped
/// instead of failing the whole frame, since many drivers pad or cut bodies.
pub fn parse_station_info(mut input: &[u8]) -> IResult<&[u8], StationInfo> {
    let mut station_info = StationInfo::default();

    while input.len() >= 2 {
        let (rest, (element_id, length)) = tuple((get_u8, get_u8))(input)?;
        let Ok((rest, data)) = take::<_, _, nom::error::Error<&[u8]>>(length)(rest) else {
            break;
        };
        input = rest;

        match element_id {
            StationInfo::SSID_ID => {
                station_info.ssid = Some(String::from_utf8_lossy(data).to_string());
                station_info.ssid_length = Some(length as usize);
            }
            StationInfo::RATES_ID => station_info.supported_rates = data.to_vec(),
            StationInfo::DS_PARAMETER_ID if !data.is_empty() => {
                station_info.ds_parameter_set = Some(data[0])
            }
            StationInfo::RSN_ID => match parse_rsn_information(data) {
                Ok((_, rsn)) => station_info.rsn_information = Some(rsn),
                Err(_) => station_info.data.push((element_id, data.to_vec())),
            },
            StationInfo::VENDOR_ID if data.len() >= 4 => {
                let oui = clone_slice::<3>(data);
                let oui_type = data[3];
                if oui == MICROSOFT_OUI && oui_type == 1 {
                    station_info.wpa_present = true;
                }
                station_info.vendor_specific.push(VendorSpecificInfo {
                    oui,
                    oui_type,
                    data: data[4..].to_vec(),
                });
            }
            _ => station_info.data.push((element_id, data.to_vec())),
        }
    }

    Ok((input, station_info))
}

/// Parse the RSN element body up to and including the capabilities field.
pub fn parse_rsn_information(input: &[u8]) -> IResult<&[u8], RsnInformation> {
    let (input, version) = le_u16(input)?;
    let (input, group) = take(4usize)(input)?;

    let (mut input, pairwise_count) = le_u16(input)?;
    let mut pairwise_cipher_suites = Vec::with_capacity(pairwise_count as usize);
    for _ in 0..pairwise_count {
        let (rest, suite) = take(4usize)(input)?;
        pairwise_cipher_suites.push(clone_slice::<4>(suite));
        input = rest;
    }

    let (mut input, akm_count) = le_u16(input)?;
    let mut akm_suites = Vec::with_capacity(akm_count as usize);
    for _ in 0..akm_count {
        let (rest, suite) = take(4usize)(input)?;
        akm_suites.push(RsnAkmSuite::from_suite_type(suite[3]));
        input = rest;
    }

    // Capabilities are optional on old APs.
    let (input, capabilities) = if input.len() >= 2 {
        le_u16(input)?
    } else {
        (input, 0)
    };

    Ok((
        input,
        RsnInformation {
            version,
            group_cipher_suite: clone_slice::<4>(group),
            pairwise_cipher_suites,
            akm_suites,
            capabilities,
        },
    ))
}
