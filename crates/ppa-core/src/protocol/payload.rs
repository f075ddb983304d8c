//! Message payloads following the header.
//!
//! Decoders only check buffer length. A well-sized but malformed payload
//! decodes to whatever values the bytes happen to hold.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::header::{Header, MessageType};
use crate::error::ProtocolError;

fn ensure_len(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        return Err(ProtocolError::ShortBuffer {
            needed,
            got: buf.len(),
        });
    }
    Ok(())
}

// ==================== Preset recall ====================

pub const RECALL_BY_PRESET_INDEX: u8 = 0;
pub const RECALL_BY_PRESET_POSITION: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetRecall {
    pub crt_flags: u8,
    pub opt_flags: u8,
    pub index_position: u8,
    pub reserved: u8,
}

impl PresetRecall {
    pub const SIZE: usize = 4;

    pub fn by_index(index: u8) -> Self {
        Self {
            crt_flags: RECALL_BY_PRESET_INDEX,
            opt_flags: 0,
            index_position: index,
            reserved: 0,
        }
    }

    pub fn by_position(position: u8) -> Self {
        Self {
            crt_flags: RECALL_BY_PRESET_POSITION,
            opt_flags: 0,
            index_position: position,
            reserved: 0,
        }
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.crt_flags);
        buf.put_u8(self.opt_flags);
        buf.put_u8(self.index_position);
        buf.put_u8(self.reserved);
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(buf, Self::SIZE)?;
        let mut r = buf;
        Ok(Self {
            crt_flags: r.get_u8(),
            opt_flags: r.get_u8(),
            index_position: r.get_u8(),
            reserved: r.get_u8(),
        })
    }
}

// ==================== Device data ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDataRequest {
    pub crt_flags: u8,
    pub opt_flags: u8,
}

impl DeviceDataRequest {
    pub const SIZE: usize = 2;

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.crt_flags);
        buf.put_u8(self.opt_flags);
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(buf, Self::SIZE)?;
        Ok(Self {
            crt_flags: buf[0],
            opt_flags: buf[1],
        })
    }
}

/// Identity and network settings reported by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDataResponse {
    pub crt_flags: u8,
    pub opt_flags: u8,
    pub device_type_id: u16,
    pub subnet_prefix_length: u8,
    pub diagnostic_state: u8,
    pub firmware_version: u32,
    pub serial_number: u16,
    pub reserved: u32,
    pub gateway_ip: [u8; 4],
    pub static_ip: [u8; 4],
    pub hardware_features: u32,
    pub start_preset_id: u8,
    pub reserved2: [u8; 6],
    pub device_name: [u8; 32],
    pub vendor_id: u8,
}

impl DeviceDataResponse {
    pub const SIZE: usize = 68;

    /// Device name up to the first NUL, lossily decoded.
    pub fn name(&self) -> String {
        let end = self
            .device_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.device_name.len());
        String::from_utf8_lossy(&self.device_name[..end]).into_owned()
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(Self::SIZE);
        buf.put_u8(self.crt_flags);
        buf.put_u8(self.opt_flags);
        buf.put_u16_le(self.device_type_id);
        buf.put_u8(self.subnet_prefix_length);
        buf.put_u8(self.diagnostic_state);
        buf.put_u32_le(self.firmware_version);
        buf.put_u16_le(self.serial_number);
        buf.put_u32_le(self.reserved);
        buf.put_slice(&self.gateway_ip);
        buf.put_slice(&self.static_ip);
        buf.put_u32_le(self.hardware_features);
        buf.put_u8(self.start_preset_id);
        buf.put_slice(&self.reserved2);
        buf.put_slice(&self.device_name);
        buf.put_u8(self.vendor_id);
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(buf, Self::SIZE)?;
        let mut r = buf;

        let crt_flags = r.get_u8();
        let opt_flags = r.get_u8();
        let device_type_id = r.get_u16_le();
        let subnet_prefix_length = r.get_u8();
        let diagnostic_state = r.get_u8();
        let firmware_version = r.get_u32_le();
        let serial_number = r.get_u16_le();
        let reserved = r.get_u32_le();
        let mut gateway_ip = [0u8; 4];
        r.copy_to_slice(&mut gateway_ip);
        let mut static_ip = [0u8; 4];
        r.copy_to_slice(&mut static_ip);
        let hardware_features = r.get_u32_le();
        let start_preset_id = r.get_u8();
        let mut reserved2 = [0u8; 6];
        r.copy_to_slice(&mut reserved2);
        let mut device_name = [0u8; 32];
        r.copy_to_slice(&mut device_name);
        let vendor_id = r.get_u8();

        Ok(Self {
            crt_flags,
            opt_flags,
            device_type_id,
            subnet_prefix_length,
            diagnostic_state,
            firmware_version,
            serial_number,
            reserved,
            gateway_ip,
            static_ip,
            hardware_features,
            start_preset_id,
            reserved2,
            device_name,
            vendor_id,
        })
    }
}

// ==================== Master volume ====================

/// Fixed selector preceding the gain in a master volume command.
pub const MASTER_VOLUME_SELECTOR: [u8; 4] = [0x01, 0x00, 0x03, 0x06];

/// Gain value for volume 1.0 (0 dB); 0.0 maps to gain 0.
const MASTER_VOLUME_FULL_SCALE: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterVolume {
    pub gain: u32,
}

impl MasterVolume {
    pub const SIZE: usize = 8;

    pub fn from_volume(volume: f32) -> Result<Self, ProtocolError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(ProtocolError::InvalidVolume(volume));
        }
        Ok(Self {
            gain: (volume * MASTER_VOLUME_FULL_SCALE) as u32,
        })
    }

    pub fn volume(&self) -> f32 {
        self.gain as f32 / MASTER_VOLUME_FULL_SCALE
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(&MASTER_VOLUME_SELECTOR);
        buf.put_u32_le(self.gain);
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(buf, Self::SIZE)?;
        let mut r = &buf[MASTER_VOLUME_SELECTOR.len()..];
        Ok(Self { gain: r.get_u32_le() })
    }

    fn matches(buf: &[u8]) -> bool {
        buf.len() >= Self::SIZE && buf[..4] == MASTER_VOLUME_SELECTOR
    }
}

// ==================== Live commands ====================

/// Node kinds along a live command path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LevelType {
    Input = 1,
    Output = 2,
    Eq = 3,
    Gain = 4,
    EqType = 5,
    Quality = 7,
    Active = 8,
    Mute = 9,
    Delay = 10,
    PhaseInversion = 11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EqType {
    LowPass6 = 0,
    LowPass12 = 1,
    HighPass6 = 2,
    HighPass12 = 3,
    Bell = 4,
    LowShelf6 = 5,
    LowShelf12 = 6,
    HighShelf6 = 7,
    HighShelf12 = 8,
    AllPass6 = 9,
    AllPass12 = 10,
}

/// One `(position, level)` step of a live command path. Positions are 0 based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub position: u8,
    pub level: LevelType,
}

impl PathStep {
    pub fn new(position: u8, level: LevelType) -> Self {
        Self { position, level }
    }
}

/// Parameter change addressed by a path of up to 5 steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveCmd {
    pub crt_flags: u8,
    pub opt_flags: u8,
    pub path: [u8; 10],
    pub value: u32,
}

impl LiveCmd {
    pub const SIZE: usize = 16;
    pub const MAX_PATH_STEPS: usize = 5;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, steps: &[PathStep]) -> Result<Self, ProtocolError> {
        if steps.len() > Self::MAX_PATH_STEPS {
            return Err(ProtocolError::PathTooLong(steps.len()));
        }
        self.path = [0; 10];
        for (i, step) in steps.iter().enumerate() {
            self.path[i * 2] = step.position;
            self.path[i * 2 + 1] = step.level as u8;
        }
        Ok(self)
    }

    /// Gain in dB, encoded as `10 * dB + 800`.
    pub fn with_gain(mut self, db: f32) -> Self {
        self.value = (db * 10.0 + 800.0) as u32;
        self
    }

    pub fn with_bool(mut self, on: bool) -> Self {
        self.value = u32::from(on);
        self
    }

    pub fn with_eq_type(mut self, eq_type: EqType) -> Self {
        self.value = eq_type as u32;
        self
    }

    /// Marks the value as a string of `len` bytes.
    pub fn with_string_len(mut self, len: usize) -> Self {
        self.crt_flags = 0x01;
        self.value = len as u32;
        self
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.crt_flags);
        buf.put_u8(self.opt_flags);
        buf.put_slice(&self.path);
        buf.put_u32_le(self.value);
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(buf, Self::SIZE)?;
        let mut r = buf;
        let crt_flags = r.get_u8();
        let opt_flags = r.get_u8();
        let mut path = [0u8; 10];
        r.copy_to_slice(&mut path);
        let value = r.get_u32_le();
        Ok(Self {
            crt_flags,
            opt_flags,
            path,
            value,
        })
    }
}

// ==================== Dispatch ====================

/// Decoded payload, chosen by message type and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    PresetRecall(PresetRecall),
    DeviceDataRequest(DeviceDataRequest),
    DeviceDataResponse(Box<DeviceDataResponse>),
    MasterVolume(MasterVolume),
    LiveCmd(LiveCmd),
    Raw(Bytes),
}

impl Payload {
    pub fn decode(header: &Header, body: &[u8]) -> Result<Self, ProtocolError> {
        if body.is_empty() {
            return Ok(Payload::Empty);
        }

        let payload = match header.message_type {
            MessageType::PresetRecall => Payload::PresetRecall(PresetRecall::parse(body)?),
            MessageType::LiveCmd => Payload::LiveCmd(LiveCmd::parse(body)?),
            MessageType::DeviceData if header.status.is_request() => {
                Payload::DeviceDataRequest(DeviceDataRequest::parse(body)?)
            }
            MessageType::DeviceData if header.status.is_response() => {
                Payload::DeviceDataResponse(Box::new(DeviceDataResponse::parse(body)?))
            }
            MessageType::DeviceData
                if header.status.is_command() && MasterVolume::matches(body) =>
            {
                Payload::MasterVolume(MasterVolume::parse(body)?)
            }
            _ => Payload::Raw(Bytes::copy_from_slice(body)),
        };

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::header::Status;

    fn encoded<F: Fn(&mut BytesMut)>(f: F) -> Vec<u8> {
        let mut buf = BytesMut::new();
        f(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_preset_recall_bytes() {
        let bytes = encoded(|b| PresetRecall::by_index(7).encode_into(b));
        assert_eq!(bytes, vec![0, 0, 7, 0]);

        let bytes = encoded(|b| PresetRecall::by_position(3).encode_into(b));
        assert_eq!(bytes, vec![2, 0, 3, 0]);
    }

    #[test]
    fn test_preset_recall_short() {
        assert!(PresetRecall::parse(&[0, 0, 1]).is_err());
        assert_eq!(PresetRecall::parse(&[0, 0, 1, 0]).unwrap().index_position, 1);
    }

    #[test]
    fn test_master_volume_encoding() {
        let vol = MasterVolume::from_volume(0.5).unwrap();
        assert_eq!(vol.gain, 500);

        let bytes = encoded(|b| vol.encode_into(b));
        assert_eq!(bytes, vec![0x01, 0x00, 0x03, 0x06, 0xf4, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_master_volume_rejects_out_of_range() {
        assert!(MasterVolume::from_volume(1.5).is_err());
        assert!(MasterVolume::from_volume(-0.1).is_err());
        assert!(MasterVolume::from_volume(f32::NAN).is_err());
        assert_eq!(MasterVolume::from_volume(1.0).unwrap().gain, 1000);
    }

    #[test]
    fn test_live_cmd_path_and_gain() {
        let cmd = LiveCmd::new()
            .with_path(&[
                PathStep::new(0, LevelType::Input),
                PathStep::new(2, LevelType::Gain),
            ])
            .unwrap()
            .with_gain(-6.0);

        assert_eq!(&cmd.path[..4], &[0, 1, 2, 4]);
        assert_eq!(cmd.value, 740);

        let bytes = encoded(|b| cmd.encode_into(b));
        assert_eq!(bytes.len(), LiveCmd::SIZE);
        assert_eq!(LiveCmd::parse(&bytes).unwrap(), cmd);
    }

    #[test]
    fn test_live_cmd_path_too_long() {
        let steps = [PathStep::new(0, LevelType::Eq); 6];
        assert_eq!(
            LiveCmd::new().with_path(&steps).unwrap_err(),
            ProtocolError::PathTooLong(6)
        );
    }

    #[test]
    fn test_device_data_response_name() {
        let mut response = DeviceDataResponse::parse(&[0u8; DeviceDataResponse::SIZE]).unwrap();
        response.device_name[..4].copy_from_slice(b"PPA1");
        response.serial_number = 4242;

        let bytes = encoded(|b| response.encode_into(b));
        assert_eq!(bytes.len(), DeviceDataResponse::SIZE);

        let parsed = DeviceDataResponse::parse(&bytes).unwrap();
        assert_eq!(parsed.name(), "PPA1");
        assert_eq!(parsed.serial_number, 4242);
    }

    #[test]
    fn test_decode_dispatch() {
        let recall = Header::new(MessageType::PresetRecall, Status::CommandClient, [0; 4], 1, 0);
        assert_eq!(
            Payload::decode(&recall, &[0, 0, 5, 0]).unwrap(),
            Payload::PresetRecall(PresetRecall::by_index(5))
        );

        let volume = Header::new(MessageType::DeviceData, Status::CommandClient, [0; 4], 1, 0);
        let body = encoded(|b| MasterVolume { gain: 250 }.encode_into(b));
        assert_eq!(
            Payload::decode(&volume, &body).unwrap(),
            Payload::MasterVolume(MasterVolume { gain: 250 })
        );

        let request = Header::new(MessageType::DeviceData, Status::RequestServer, [0; 4], 1, 0);
        assert!(matches!(
            Payload::decode(&request, &[1, 2]).unwrap(),
            Payload::DeviceDataRequest(DeviceDataRequest { crt_flags: 1, opt_flags: 2 })
        ));

        let ping = Header::new(MessageType::Ping, Status::ResponseServer, [0; 4], 1, 0);
        assert_eq!(Payload::decode(&ping, &[]).unwrap(), Payload::Empty);
        assert!(matches!(Payload::decode(&ping, &[9, 9]).unwrap(), Payload::Raw(_)));
    }

    #[test]
    fn test_decode_full_size_bodies() {
        let response = Header::new(MessageType::DeviceData, Status::ResponseServer, [0; 4], 1, 0);
        assert!(matches!(
            Payload::decode(&response, &[0u8; 68]).unwrap(),
            Payload::DeviceDataResponse(_)
        ));

        let live = Header::new(MessageType::LiveCmd, Status::CommandClient, [0; 4], 1, 0);
        let cmd = LiveCmd::new().with_gain(0.0);
        let body = encoded(|b| cmd.encode_into(b));
        assert_eq!(body.len(), 16);
        assert_eq!(Payload::decode(&live, &body).unwrap(), Payload::LiveCmd(cmd));
    }

    #[test]
    fn test_decode_short_payload_fails() {
        let response = Header::new(MessageType::DeviceData, Status::ResponseServer, [0; 4], 1, 0);
        assert!(Payload::decode(&response, &[0u8; 10]).is_err());
    }
}
