//! The BSS packet format: a tiny TLV envelope used for compact peer
//! messages (callsign/destination/message/GPS).

use crate::error::{CodecError, CodecResult};

const MARKER: u8 = 0x01;

const TAG_CALLSIGN: u8 = 0x20;
const TAG_DESTINATION: u8 = 0x21;
const TAG_MESSAGE: u8 = 0x24;
const TAG_LOCATION: u8 = 0x25;
const TAG_LOCATION_REQUEST: u8 = 0x27;
const TAG_CALL_REQUEST: u8 = 0x28;
const TAG_MESSAGE_ID: u8 = 0x85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Latitude in micro-degrees.
    pub lat_udeg: i32,
    /// Longitude in micro-degrees.
    pub lon_udeg: i32,
    /// Altitude in meters, if present.
    pub altitude_m: Option<i16>,
}

/// A single unrecognized tag, preserved bit-exact for round-tripping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    pub tag: u8,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BssPacket {
    pub callsign: Option<String>,
    pub destination: Option<String>,
    pub message: Option<String>,
    pub location: Option<Location>,
    pub location_request: bool,
    pub call_request: bool,
    pub message_id: Option<u16>,
    pub unknown: Vec<RawField>,
}

impl BssPacket {
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.first() != Some(&MARKER) {
            return Err(CodecError::BadBssMarker);
        }
        let mut packet = BssPacket::default();
        let mut offset = 1usize;
        while offset < bytes.len() {
            let tag = bytes[offset];
            let len = *bytes.get(offset + 1).ok_or(CodecError::BssLengthOverrun)? as usize;
            let start = offset + 2;
            let value = bytes
                .get(start..start + len)
                .ok_or(CodecError::BssLengthOverrun)?;
            offset = start + len;
            match tag {
                TAG_CALLSIGN => packet.callsign = Some(String::from_utf8_lossy(value).into_owned()),
                TAG_DESTINATION => {
                    packet.destination = Some(String::from_utf8_lossy(value).into_owned())
                }
                TAG_MESSAGE => packet.message = Some(String::from_utf8_lossy(value).into_owned()),
                TAG_LOCATION => packet.location = Some(decode_location(value)?),
                TAG_LOCATION_REQUEST => packet.location_request = true,
                TAG_CALL_REQUEST => packet.call_request = true,
                TAG_MESSAGE_ID => {
                    if value.len() != 2 {
                        return Err(CodecError::BssLengthOverrun);
                    }
                    packet.message_id = Some(u16::from_be_bytes([value[0], value[1]]));
                }
                other => packet.unknown.push(RawField {
                    tag: other,
                    value: value.to_vec(),
                }),
            }
        }
        Ok(packet)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![MARKER];
        if let Some(callsign) = &self.callsign {
            push_tlv(&mut out, TAG_CALLSIGN, callsign.as_bytes());
        }
        if let Some(dest) = &self.destination {
            push_tlv(&mut out, TAG_DESTINATION, dest.as_bytes());
        }
        if let Some(msg) = &self.message {
            push_tlv(&mut out, TAG_MESSAGE, msg.as_bytes());
        }
        if let Some(loc) = &self.location {
            let mut value = Vec::with_capacity(10);
            value.extend_from_slice(&loc.lat_udeg.to_le_bytes());
            value.extend_from_slice(&loc.lon_udeg.to_le_bytes());
            if let Some(alt) = loc.altitude_m {
                value.extend_from_slice(&alt.to_le_bytes());
            }
            push_tlv(&mut out, TAG_LOCATION, &value);
        }
        if self.location_request {
            push_tlv(&mut out, TAG_LOCATION_REQUEST, &[]);
        }
        if self.call_request {
            push_tlv(&mut out, TAG_CALL_REQUEST, &[]);
        }
        if let Some(id) = self.message_id {
            push_tlv(&mut out, TAG_MESSAGE_ID, &id.to_be_bytes());
        }
        for raw in &self.unknown {
            push_tlv(&mut out, raw.tag, &raw.value);
        }
        out
    }
}

fn push_tlv(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    out.push(value.len() as u8);
    out.extend_from_slice(value);
}

fn decode_location(value: &[u8]) -> CodecResult<Location> {
    if value.len() != 8 && value.len() != 10 {
        return Err(CodecError::BadBssLocation);
    }
    let lat_udeg = i32::from_le_bytes(value[0..4].try_into().unwrap());
    let lon_udeg = i32::from_le_bytes(value[4..8].try_into().unwrap());
    let altitude_m = if value.len() == 10 {
        Some(i16::from_le_bytes(value[8..10].try_into().unwrap()))
    } else {
        None
    };
    Ok(Location {
        lat_udeg,
        lon_udeg,
        altitude_m,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_known_fields() {
        let packet = BssPacket {
            callsign: Some("KK7VZT".into()),
            destination: Some("W1AW".into()),
            message: Some("hello".into()),
            location: Some(Location {
                lat_udeg: 47_600_000,
                lon_udeg: -122_300_000,
                altitude_m: Some(120),
            }),
            location_request: false,
            call_request: false,
            message_id: Some(0x0102),
            unknown: vec![],
        };
        let wire = packet.encode();
        let decoded = BssPacket::decode(&wire).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn preserves_unknown_tags_bit_exact() {
        let packet = BssPacket {
            unknown: vec![RawField {
                tag: 0x99,
                value: vec![1, 2, 3],
            }],
            ..Default::default()
        };
        let wire = packet.encode();
        let decoded = BssPacket::decode(&wire).unwrap();
        assert_eq!(decoded.unknown, packet.unknown);
    }

    #[test]
    fn rejects_missing_marker() {
        assert_eq!(
            BssPacket::decode(&[0x02, 0x20, 0x00]).unwrap_err(),
            CodecError::BadBssMarker
        );
    }

    #[test]
    fn rejects_length_overrun() {
        let wire = [MARKER, TAG_CALLSIGN, 10, b'a', b'b'];
        assert_eq!(
            BssPacket::decode(&wire).unwrap_err(),
            CodecError::BssLengthOverrun
        );
    }

    #[test]
    fn location_without_altitude_round_trips() {
        let packet = BssPacket {
            location: Some(Location {
                lat_udeg: 1,
                lon_udeg: -1,
                altitude_m: None,
            }),
            ..Default::default()
        };
        let decoded = BssPacket::decode(&packet.encode()).unwrap();
        assert_eq!(decoded.location, packet.location);
    }
}
