//! Support for the unencrypted
//! [Eddystone-TLM](https://github.com/google/eddystone/blob/master/eddystone-tlm/tlm-plain.md)
//! telemetry frame.

use crate::{DecodeError, FRAME_TYPE_TLM};
use std::fmt::{self, Display, Formatter};

const TLM_VERSION_PLAIN: u8 = 0x00;
const TLM_LENGTH: usize = 14;

/// Converts the raw temperature field of a TLM frame to °C.
///
/// The field is 8.8 fixed point, sent big-endian. `raw` is the value as read by
/// [`TlmFrame::decode`], i.e. with the two wire bytes taken as little-endian, so it is packed
/// back to big-endian bytes and those bytes read as a little-endian signed integer before scaling.
pub fn decode_temperature(raw: u16) -> f32 {
    f32::from(i16::from_le_bytes(raw.to_be_bytes())) / 256.0
}

/// An unencrypted Eddystone-TLM frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TlmFrame {
    /// TLM version, always 0 for unencrypted frames.
    pub version: u8,
    /// Battery voltage in mV, or 0 if the beacon isn't battery powered.
    pub battery_mv: u16,
    /// Temperature field, see [`decode_temperature`].
    pub raw_temperature: u16,
    /// Number of advertisements sent since the beacon powered on.
    pub advertisement_count: u32,
    /// Time since the beacon powered on, in units of 0.1 seconds.
    pub uptime_deciseconds: u32,
}

impl TlmFrame {
    /// Tries to decode the given service data as a TLM frame, including the frame type byte.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() != TLM_LENGTH {
            return Err(DecodeError::InvalidLength {
                frame_type: FRAME_TYPE_TLM,
                length: data.len(),
            });
        }
        if data[1] != TLM_VERSION_PLAIN {
            return Err(DecodeError::UnsupportedTlmVersion(data[1]));
        }
        Ok(Self {
            version: data[1],
            battery_mv: u16::from_be_bytes([data[2], data[3]]),
            raw_temperature: u16::from_le_bytes([data[4], data[5]]),
            advertisement_count: u32::from_be_bytes([data[6], data[7], data[8], data[9]]),
            uptime_deciseconds: u32::from_be_bytes([data[10], data[11], data[12], data[13]]),
        })
    }

    /// Encodes the frame as Eddystone service data.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(TLM_LENGTH);
        data.push(FRAME_TYPE_TLM);
        data.push(self.version);
        data.extend_from_slice(&self.battery_mv.to_be_bytes());
        data.extend_from_slice(&self.raw_temperature.to_le_bytes());
        data.extend_from_slice(&self.advertisement_count.to_be_bytes());
        data.extend_from_slice(&self.uptime_deciseconds.to_be_bytes());
        data
    }

    /// Returns the temperature reading in °C.
    pub fn temperature(&self) -> f32 {
        decode_temperature(self.raw_temperature)
    }
}

impl Display for TlmFrame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "TLM v{}: {:0.2}°C, {}mV battery, {} advertisements, {:.1}s uptime",
            self.version,
            self.temperature(),
            self.battery_mv,
            self.advertisement_count,
            f64::from(self.uptime_deciseconds) / 10.0,
        )
    }
}
