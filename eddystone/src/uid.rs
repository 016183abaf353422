//! Support for the [Eddystone-UID](https://github.com/google/eddystone/tree/master/eddystone-uid)
//! identifier frame.

use crate::{DecodeError, FRAME_TYPE_UID};
use std::fmt::{self, Display, Formatter, Write};

/// A UID frame is 18 bytes, optionally followed by two reserved bytes.
const UID_LENGTH: usize = 18;
const UID_LENGTH_WITH_RESERVED: usize = 20;

/// An Eddystone-UID frame, identifying a beacon by namespace and instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UidFrame {
    /// Calibrated TX power at 0m, in dBm.
    pub tx_power: i8,
    pub namespace: [u8; 10],
    pub instance: [u8; 6],
}

impl UidFrame {
    /// Tries to decode the given service data as a UID frame, including the frame type byte.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() != UID_LENGTH && data.len() != UID_LENGTH_WITH_RESERVED {
            return Err(DecodeError::InvalidLength {
                frame_type: FRAME_TYPE_UID,
                length: data.len(),
            });
        }
        let mut namespace = [0; 10];
        namespace.copy_from_slice(&data[2..12]);
        let mut instance = [0; 6];
        instance.copy_from_slice(&data[12..18]);
        Ok(Self {
            tx_power: data[1] as i8,
            namespace,
            instance,
        })
    }

    /// Encodes the frame as Eddystone service data, including the reserved bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(UID_LENGTH_WITH_RESERVED);
        data.push(FRAME_TYPE_UID);
        data.push(self.tx_power as u8);
        data.extend_from_slice(&self.namespace);
        data.extend_from_slice(&self.instance);
        data.extend_from_slice(&[0, 0]);
        data
    }

    /// Returns the namespace as 20 lowercase hex digits.
    pub fn namespace_hex(&self) -> String {
        to_hex(&self.namespace)
    }

    /// Returns the instance as 12 lowercase hex digits.
    pub fn instance_hex(&self) -> String {
        to_hex(&self.instance)
    }
}

impl Display for UidFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "UID {}/{}, {} dBm at 0m",
            self.namespace_hex(),
            self.instance_hex(),
            self.tx_power
        )
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut hex, byte| {
            // Writing to a String can't fail.
            let _ = write!(hex, "{:02x}", byte);
            hex
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UID: UidFrame = UidFrame {
        tx_power: -20,
        namespace: [0xed, 0xd1, 0xeb, 0xea, 0xc0, 0x4e, 0x5d, 0xef, 0xa0, 0x17],
        instance: [0x0b, 0xdb, 0x87, 0x53, 0x96, 0x10],
    };

    #[test]
    fn decode_with_reserved() {
        let decoded = UidFrame::decode(&[
            0x00, 0xec, 0xed, 0xd1, 0xeb, 0xea, 0xc0, 0x4e, 0x5d, 0xef, 0xa0, 0x17, 0x0b, 0xdb,
            0x87, 0x53, 0x96, 0x10, 0x00, 0x00,
        ])
        .unwrap();
        assert_eq!(decoded, UID);
        assert_eq!(decoded.namespace_hex(), "edd1ebeac04e5defa017");
        assert_eq!(decoded.instance_hex(), "0bdb87539610");
    }

    #[test]
    fn decode_without_reserved() {
        assert_eq!(
            UidFrame::decode(&[
                0x00, 0xec, 0xed, 0xd1, 0xeb, 0xea, 0xc0, 0x4e, 0x5d, 0xef, 0xa0, 0x17, 0x0b, 0xdb,
                0x87, 0x53, 0x96, 0x10,
            ]),
            Ok(UID)
        );
    }

    #[test]
    fn encode() {
        assert_eq!(
            UID.encode(),
            &[
                0x00, 0xec, 0xed, 0xd1, 0xeb, 0xea, 0xc0, 0x4e, 0x5d, 0xef, 0xa0, 0x17, 0x0b, 0xdb,
                0x87, 0x53, 0x96, 0x10, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn decode_truncated() {
        assert_eq!(
            UidFrame::decode(&[0x00, 0xec, 0xed, 0xd1]),
            Err(DecodeError::InvalidLength {
                frame_type: 0x00,
                length: 4
            })
        );
    }
}
