use std::fmt;
use std::str::FromStr;

use crate::error::{CodecError, CodecResult};

/// An AX.25 station address: a 1-6 character callsign (space-padded to six
/// on the wire), an SSID in 0..=15, and the three command/response/reserved
/// bits carried in the high bits of the SSID octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    /// Always exactly six bytes, upper-cased and space-padded on the right.
    callsign: [u8; 6],
    ssid: u8,
    /// Command/response bit of address 0/1; reserved bit 2 carries the
    /// modulo-128 flag (CRBit2 of the *second* address).
    pub cr_bit1: bool,
    pub cr_bit2: bool,
    pub cr_bit3: bool,
}

impl Address {
    /// Builds an address from a callsign (1-6 alphanumeric chars, any case)
    /// and an SSID (0-15). Returns `None` if the callsign or SSID is out of
    /// range.
    pub fn new(callsign: &str, ssid: u8) -> Option<Self> {
        if callsign.is_empty() || callsign.len() > 6 || ssid > 15 {
            return None;
        }
        if !callsign.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        let mut padded = [b' '; 6];
        for (slot, b) in padded.iter_mut().zip(callsign.bytes()) {
            *slot = b.to_ascii_uppercase();
        }
        Some(Self {
            callsign: padded,
            ssid,
            cr_bit1: false,
            cr_bit2: false,
            cr_bit3: false,
        })
    }

    pub fn with_cr_bits(mut self, cr1: bool, cr2: bool, cr3: bool) -> Self {
        self.cr_bit1 = cr1;
        self.cr_bit2 = cr2;
        self.cr_bit3 = cr3;
        self
    }

    /// The callsign with trailing padding spaces removed.
    pub fn callsign(&self) -> &str {
        let end = self
            .callsign
            .iter()
            .rposition(|&b| b != b' ')
            .map(|i| i + 1)
            .unwrap_or(0);
        std::str::from_utf8(&self.callsign[..end]).expect("callsign bytes are ASCII")
    }

    pub fn ssid(&self) -> u8 {
        self.ssid
    }

    /// Encodes this address as 7 wire bytes. `last` sets the end-of-chain
    /// bit (low bit of the SSID octet).
    pub fn encode(&self, last: bool) -> [u8; 7] {
        let mut out = [0u8; 7];
        for (i, &b) in self.callsign.iter().enumerate() {
            out[i] = b << 1;
        }
        out[6] = ((self.cr_bit1 as u8) << 7)
            | ((self.cr_bit2 as u8) << 6)
            | ((self.cr_bit3 as u8) << 5)
            | (self.ssid << 1)
            | (last as u8);
        out
    }

    /// Decodes one 7-byte address starting at `offset`, returning the
    /// address and whether its end-of-chain bit was set.
    pub fn decode(bytes: &[u8], offset: usize) -> CodecResult<(Self, bool)> {
        let chunk = bytes
            .get(offset..offset + 7)
            .ok_or(CodecError::Truncated)?;
        let mut callsign = [0u8; 6];
        for (i, &raw) in chunk[..6].iter().enumerate() {
            if raw & 0x01 != 0 {
                // The six callsign-character bytes never carry the HDLC
                // extension bit; that lives solely in the SSID octet.
                return Err(CodecError::PrematureEndOfChain);
            }
            let ch = raw >> 1;
            if !(0x20..=0x5F).contains(&ch) {
                return Err(CodecError::UnprintableCallsign);
            }
            callsign[i] = ch;
        }
        let ssid_byte = chunk[6];
        let addr = Address {
            callsign,
            ssid: (ssid_byte >> 1) & 0x0F,
            cr_bit1: ssid_byte & 0x80 != 0,
            cr_bit2: ssid_byte & 0x40 != 0,
            cr_bit3: ssid_byte & 0x20 != 0,
        };
        let last = ssid_byte & 0x01 != 0;
        Ok((addr, last))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.callsign())
        } else {
            write!(f, "{}-{}", self.callsign(), self.ssid)
        }
    }
}

impl FromStr for Address {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (call, ssid) = match s.split_once('-') {
            Some((c, s)) => (c, s.parse::<u8>().map_err(|_| CodecError::UnprintableCallsign)?),
            None => (s, 0),
        };
        Address::new(call, ssid).ok_or(CodecError::UnprintableCallsign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_padded_callsign() {
        let addr = Address::new("KK7VZT", 1).unwrap().with_cr_bits(true, false, true);
        let wire = addr.encode(true);
        let (decoded, last) = Address::decode(&wire, 0).unwrap();
        assert!(last);
        assert_eq!(decoded, addr);
        assert_eq!(decoded.callsign(), "KK7VZT");
        assert_eq!(decoded.ssid(), 1);
    }

    #[test]
    fn rejects_extension_bit_on_a_callsign_byte() {
        let addr = Address::new("N0CALL", 0).unwrap();
        let mut wire = addr.encode(false);
        wire[0] |= 0x01;
        assert_eq!(
            Address::decode(&wire, 0).unwrap_err(),
            CodecError::PrematureEndOfChain
        );
    }

    #[test]
    fn truncated_address_is_rejected() {
        let wire = [0u8; 4];
        assert_eq!(Address::decode(&wire, 0).unwrap_err(), CodecError::Truncated);
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let addr = Address::new("W1AW", 9).unwrap();
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed.callsign(), "W1AW");
        assert_eq!(parsed.ssid(), 9);
    }
}
