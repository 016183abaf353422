//! A library for decoding [Eddystone](https://github.com/google/eddystone) frames from BLE
//! advertisements.
//!
//! Only the frames needed to identify a beacon and read its telemetry are supported: UID frames and
//! unencrypted TLM frames.

pub mod tlm;
pub mod uid;

pub use crate::tlm::{decode_temperature, TlmFrame};
pub use crate::uid::UidFrame;
use bluez_async::uuid_from_u16;
use log::debug;
use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
};
use thiserror::Error;
use uuid::Uuid;

/// The 16-bit service UUID 0xfeaa, under which Eddystone frames are sent as service data.
pub const UUID: Uuid = uuid_from_u16(0xfeaa);

const FRAME_TYPE_UID: u8 = 0x00;
const FRAME_TYPE_TLM: u8 = 0x20;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DecodeError {
    #[error("Empty service data")]
    Empty,
    #[error("Unsupported frame type {0:#04x}")]
    UnsupportedFrameType(u8),
    #[error("Invalid length {length} for frame type {frame_type:#04x}")]
    InvalidLength { frame_type: u8, length: usize },
    #[error("Unsupported TLM version {0:#04x}")]
    UnsupportedTlmVersion(u8),
}

/// A decoded Eddystone frame. URL and EID frames carry nothing we need, so they are reported as
/// [`DecodeError::UnsupportedFrameType`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Frame {
    Uid(UidFrame),
    Tlm(TlmFrame),
}

impl Frame {
    /// Decodes the Eddystone frame (if any) from the service data of a BLE advertisement.
    ///
    /// Returns `None` if there is no Eddystone service data or it can't be decoded.
    pub fn from_service_data(service_data: &HashMap<Uuid, Vec<u8>>) -> Option<Self> {
        let data = service_data.get(&UUID)?;
        match Self::decode(data) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("Not decoding Eddystone frame: {}", e);
                None
            }
        }
    }

    /// Decodes the given bytestring (from service data with UUID [`UUID`]) as an Eddystone frame.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let frame_type = *data.first().ok_or(DecodeError::Empty)?;
        match frame_type {
            FRAME_TYPE_UID => Ok(Self::Uid(UidFrame::decode(data)?)),
            FRAME_TYPE_TLM => Ok(Self::Tlm(TlmFrame::decode(data)?)),
            _ => Err(DecodeError::UnsupportedFrameType(frame_type)),
        }
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Uid(uid) => uid.fmt(f),
            Self::Tlm(tlm) => tlm.fmt(f),
        }
    }
}
