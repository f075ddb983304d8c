//! Frame builders for the PPA device protocol.
//!
//! Each builder returns a complete datagram (header plus payload) ready to be
//! queued on a client.

use bytes::{Bytes, BytesMut};

use super::header::{Header, MessageType, Status, HEADER_SIZE};
use super::payload::{DeviceDataRequest, LiveCmd, MasterVolume, PresetRecall};
use crate::error::ProtocolError;

/// Device id used when the target is unknown or a broadcast
pub const BROADCAST_DEVICE_ID: [u8; 4] = [0, 0, 0, 0];

/// Command builders for device protocol
pub struct Commands;

impl Commands {
    fn header(message_type: MessageType, status: Status, seq: u16, component_id: u8) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + 32);
        Header::new(message_type, status, BROADCAST_DEVICE_ID, seq, component_id)
            .encode_into(&mut buf);
        buf
    }

    /// Liveness request; devices answer with a ping response
    pub fn ping(seq: u16, component_id: u8) -> Bytes {
        Self::header(MessageType::Ping, Status::RequestServer, seq, component_id).freeze()
    }

    /// Recall the preset stored at `index`
    pub fn preset_recall_by_index(seq: u16, component_id: u8, index: u8) -> Bytes {
        let mut buf =
            Self::header(MessageType::PresetRecall, Status::CommandClient, seq, component_id);
        PresetRecall::by_index(index).encode_into(&mut buf);
        buf.freeze()
    }

    /// Recall the preset at list `position`
    pub fn preset_recall_by_position(seq: u16, component_id: u8, position: u8) -> Bytes {
        let mut buf =
            Self::header(MessageType::PresetRecall, Status::CommandClient, seq, component_id);
        PresetRecall::by_position(position).encode_into(&mut buf);
        buf.freeze()
    }

    /// Set master volume; `volume` 1.0 is 0 dB, 0.0 is fully attenuated
    pub fn master_volume(seq: u16, component_id: u8, volume: f32) -> Result<Bytes, ProtocolError> {
        let volume = MasterVolume::from_volume(volume)?;
        let mut buf =
            Self::header(MessageType::DeviceData, Status::CommandClient, seq, component_id);
        volume.encode_into(&mut buf);
        Ok(buf.freeze())
    }

    /// Ask a device for its identity block
    pub fn device_data_request(seq: u16, component_id: u8) -> Bytes {
        let mut buf =
            Self::header(MessageType::DeviceData, Status::RequestServer, seq, component_id);
        DeviceDataRequest {
            crt_flags: 0,
            opt_flags: 0,
        }
        .encode_into(&mut buf);
        buf.freeze()
    }

    pub fn live_cmd(seq: u16, component_id: u8, cmd: &LiveCmd) -> Bytes {
        let mut buf = Self::header(MessageType::LiveCmd, Status::CommandClient, seq, component_id);
        cmd.encode_into(&mut buf);
        buf.freeze()
    }

    /// Reply a device sends for any handled request: a ping response echoing
    /// the request's sequence number.
    pub fn response(request: &Header, device_unique_id: [u8; 4], component_id: u8) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        Header::new(
            MessageType::Ping,
            Status::ResponseServer,
            device_unique_id,
            request.sequence_number,
            component_id,
        )
        .encode_into(&mut buf);
        buf.freeze()
    }
}
