//! Fixed 12-byte message header.
//!
//! ```text
//! offset 0:  MessageType    u8
//! offset 1:  ProtocolId     u8      (always 1)
//! offset 2:  Status         u16 LE
//! offset 4:  DeviceUniqueId [4]u8
//! offset 8:  SequenceNumber u16 LE
//! offset 10: ComponentId    u8
//! offset 11: Reserved       u8
//! ```

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Encoded header length in bytes
pub const HEADER_SIZE: usize = 12;

/// Value of the protocol id byte in every header
pub const PROTOCOL_ID: u8 = 1;

/// Message type carried in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Ping,
    LiveCmd,
    DeviceData,
    PresetRecall,
    PresetSave,
    Unknown,
    /// Any other byte value (vendor specific). Only unassigned values
    /// survive a round trip; use [`MessageType::normalized`] on hand-built ones.
    Vendor(u8),
}

impl MessageType {
    /// Canonical variant for the same wire byte, e.g. `Vendor(0)` becomes `Ping`.
    pub fn normalized(self) -> Self {
        Self::from(u8::from(self))
    }
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        match value {
            0 => MessageType::Ping,
            1 => MessageType::LiveCmd,
            2 => MessageType::DeviceData,
            4 => MessageType::PresetRecall,
            5 => MessageType::PresetSave,
            255 => MessageType::Unknown,
            other => MessageType::Vendor(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Ping => 0,
            MessageType::LiveCmd => 1,
            MessageType::DeviceData => 2,
            MessageType::PresetRecall => 4,
            MessageType::PresetSave => 5,
            MessageType::Unknown => 255,
            MessageType::Vendor(other) => other,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Ping => write!(f, "Ping"),
            MessageType::LiveCmd => write!(f, "LiveCmd"),
            MessageType::DeviceData => write!(f, "DeviceData"),
            MessageType::PresetRecall => write!(f, "PresetRecall"),
            MessageType::PresetSave => write!(f, "PresetSave"),
            MessageType::Unknown => write!(f, "Unknown"),
            MessageType::Vendor(v) => write!(f, "Vendor(0x{:02x})", v),
        }
    }
}

/// Request/response/command/wait/error status, per direction.
///
/// `*Client` values are sent by devices acting on a controller's behalf,
/// `*Server` values address the device side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    CommandClient,
    RequestClient,
    ResponseClient,
    ErrorClient,
    WaitClient,
    CommandServer,
    RequestServer,
    ResponseServer,
    ErrorServer,
    WaitServer,
    /// Any unassigned value. Assigned values wrapped here are mapped back
    /// to their named variant by [`Status::normalized`].
    Other(u16),
}

impl Status {
    /// Canonical variant for the same wire value, e.g. `Other(0x0102)` becomes `CommandClient`.
    pub fn normalized(self) -> Self {
        Self::from(u16::from(self))
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Status::RequestClient | Status::RequestServer)
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Status::ResponseClient | Status::ResponseServer)
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Status::CommandClient | Status::CommandServer)
    }
}

impl From<u16> for Status {
    fn from(value: u16) -> Self {
        match value {
            0x0102 => Status::CommandClient,
            0x0106 => Status::RequestClient,
            0x0101 => Status::ResponseClient,
            0x0109 => Status::ErrorClient,
            0x0141 => Status::WaitClient,
            0x0002 => Status::CommandServer,
            0x0006 => Status::RequestServer,
            0x0001 => Status::ResponseServer,
            0x0009 => Status::ErrorServer,
            0x0041 => Status::WaitServer,
            other => Status::Other(other),
        }
    }
}

impl From<Status> for u16 {
    fn from(value: Status) -> Self {
        match value {
            Status::CommandClient => 0x0102,
            Status::RequestClient => 0x0106,
            Status::ResponseClient => 0x0101,
            Status::ErrorClient => 0x0109,
            Status::WaitClient => 0x0141,
            Status::CommandServer => 0x0002,
            Status::RequestServer => 0x0006,
            Status::ResponseServer => 0x0001,
            Status::ErrorServer => 0x0009,
            Status::WaitServer => 0x0041,
            Status::Other(other) => other,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Other(v) => write!(f, "Other(0x{:04x})", v),
            named => write!(f, "{:?}", named),
        }
    }
}

/// Basic header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub message_type: MessageType,
    pub protocol_id: u8,
    pub status: Status,
    pub device_unique_id: [u8; 4],
    pub sequence_number: u16,
    pub component_id: u8,
    pub reserved: u8,
}

impl Header {
    /// Build a header the way controllers emit them (protocol id 1, reserved 1).
    pub fn new(
        message_type: MessageType,
        status: Status,
        device_unique_id: [u8; 4],
        sequence_number: u16,
        component_id: u8,
    ) -> Self {
        Self {
            message_type: message_type.normalized(),
            protocol_id: PROTOCOL_ID,
            status: status.normalized(),
            device_unique_id,
            sequence_number,
            component_id,
            reserved: 1,
        }
    }

    /// Append the encoded header to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(HEADER_SIZE);
        buf.put_u8(self.message_type.into());
        buf.put_u8(self.protocol_id);
        buf.put_u16_le(self.status.into());
        buf.put_slice(&self.device_unique_id);
        buf.put_u16_le(self.sequence_number);
        buf.put_u8(self.component_id);
        buf.put_u8(self.reserved);
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        self.encode_into(&mut buf);
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(&buf);
        out
    }

    /// Parse the first 12 bytes of `buf`. Trailing bytes are ignored.
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Err(ProtocolError::ShortBuffer {
                needed: HEADER_SIZE,
                got: buf.len(),
            });
        }

        let mut r = &buf[..HEADER_SIZE];
        let message_type = MessageType::from(r.get_u8());
        let protocol_id = r.get_u8();
        let status = Status::from(r.get_u16_le());
        let mut device_unique_id = [0u8; 4];
        r.copy_to_slice(&mut device_unique_id);
        let sequence_number = r.get_u16_le();
        let component_id = r.get_u8();
        let reserved = r.get_u8();

        Ok(Self {
            message_type,
            protocol_id,
            status,
            device_unique_id,
            sequence_number,
            component_id,
            reserved,
        })
    }

    /// Parse the header and return it with the payload that follows.
    pub fn split(buf: &[u8]) -> Result<(Self, &[u8]), ProtocolError> {
        let header = Self::parse(buf)?;
        Ok((header, &buf[HEADER_SIZE..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_assigned_values_normalize() {
        assert_eq!(MessageType::Vendor(0).normalized(), MessageType::Ping);
        assert_eq!(MessageType::Vendor(0x42).normalized(), MessageType::Vendor(0x42));
        assert_eq!(Status::Other(0x0102).normalized(), Status::CommandClient);

        let header = Header::new(MessageType::Vendor(0), Status::Other(0x0102), [0; 4], 1, 0);
        assert_eq!(header.message_type, MessageType::Ping);
        assert_eq!(header.status, Status::CommandClient);
        assert_eq!(Header::parse(&header.encode()).unwrap(), header);
    }
    use proptest::prelude::*;

    #[test]
    fn test_encode_layout() {
        let header = Header::new(
            MessageType::PresetRecall,
            Status::CommandClient,
            [0xde, 0xad, 0xbe, 0xef],
            0x1234,
            0xfe,
        );

        assert_eq!(
            header.encode(),
            [0x04, 0x01, 0x02, 0x01, 0xde, 0xad, 0xbe, 0xef, 0x34, 0x12, 0xfe, 0x01]
        );
    }

    #[test]
    fn test_parse_short_buffer() {
        let err = Header::parse(&[0u8; 11]).unwrap_err();
        assert_eq!(err, ProtocolError::ShortBuffer { needed: 12, got: 11 });
        assert!(Header::parse(&[]).is_err());
    }

    #[test]
    fn test_parse_ping_response() {
        let raw = [0x00, 0x01, 0x01, 0x00, 1, 2, 3, 4, 0x07, 0x00, 0xff, 0x00];
        let header = Header::parse(&raw).unwrap();

        assert_eq!(header.message_type, MessageType::Ping);
        assert_eq!(header.status, Status::ResponseServer);
        assert_eq!(header.device_unique_id, [1, 2, 3, 4]);
        assert_eq!(header.sequence_number, 7);
        assert_eq!(header.component_id, 0xff);
        assert_eq!(header.reserved, 0);
    }

    #[test]
    fn test_split_returns_payload() {
        let mut raw = Header::new(MessageType::PresetRecall, Status::CommandClient, [0; 4], 1, 0)
            .encode()
            .to_vec();
        raw.extend_from_slice(&[0, 0, 3, 0]);

        let (header, payload) = Header::split(&raw).unwrap();
        assert_eq!(header.message_type, MessageType::PresetRecall);
        assert_eq!(payload, &[0, 0, 3, 0]);
    }

    #[test]
    fn test_vendor_values_preserved() {
        assert_eq!(MessageType::from(9), MessageType::Vendor(9));
        assert_eq!(u8::from(MessageType::Vendor(9)), 9);
        assert_eq!(Status::from(0x7777), Status::Other(0x7777));
        assert_eq!(format!("{}", Status::from(0x0006)), "RequestServer");
    }

    fn any_header() -> impl Strategy<Value = Header> {
        (
            any::<u8>(),
            any::<u8>(),
            any::<u16>(),
            any::<[u8; 4]>(),
            any::<u16>(),
            any::<u8>(),
            any::<u8>(),
        )
            .prop_map(|(mt, pid, status, id, seq, comp, reserved)| Header {
                message_type: MessageType::from(mt),
                protocol_id: pid,
                status: Status::from(status),
                device_unique_id: id,
                sequence_number: seq,
                component_id: comp,
                reserved,
            })
    }

    proptest! {
        #[test]
        fn prop_header_round_trip(header in any_header()) {
            prop_assert_eq!(Header::parse(&header.encode()).unwrap(), header);
        }

        #[test]
        fn prop_parse_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let result = Header::parse(&data);
            prop_assert_eq!(result.is_ok(), data.len() >= HEADER_SIZE);
        }
    }
}
