//! Wire protocol for PPA amplifiers.
//!
//! Every datagram is a 12-byte [`Header`] followed by an optional payload.
//! All multi-byte integers are little-endian.

pub mod commands;
pub mod dump;
pub mod header;
pub mod payload;

pub use commands::{Commands, BROADCAST_DEVICE_ID};
pub use dump::hexdump;
pub use header::{Header, MessageType, Status, HEADER_SIZE, PROTOCOL_ID};
pub use payload::{
    DeviceDataRequest, DeviceDataResponse, EqType, LevelType, LiveCmd, MasterVolume, PathStep,
    Payload, PresetRecall,
};
