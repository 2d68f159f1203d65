use bitflags::bitflags;
use glam::{IVec3, Vec3};

use super::codec::{ByteReader, ByteWriter, CodecError, CodecResult};
use crate::world::Block;

pub const PROTOCOL_MAGIC: u32 = 0x4C42_4E4B;
pub const PROTOCOL_VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 4 + 1 + 1 + 2 + 4;
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;
pub const NAME_LEN: usize = 32;
pub const PLAYER_STATE_SIZE: usize = 1 + 12 + 12 + 4 + 4 + 1 + 1;
pub const BLOCK_EDIT_SIZE: usize = 12 + 2 + 1 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    ConnectRequest = 0x01,
    ConnectAccept = 0x02,
    ConnectReject = 0x03,
    Disconnect = 0x04,
    Heartbeat = 0x05,
    HeartbeatAck = 0x06,
    PlayerJoin = 0x10,
    PlayerLeave = 0x11,
    PlayerState = 0x12,
    PlayerStates = 0x13,
    BlockChange = 0x20,
    ChunkRequest = 0x21,
    ChunkResponse = 0x22,
    TimeSync = 0x30,
    InventorySync = 0x31,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        let ty = match value {
            0x01 => Self::ConnectRequest,
            0x02 => Self::ConnectAccept,
            0x03 => Self::ConnectReject,
            0x04 => Self::Disconnect,
            0x05 => Self::Heartbeat,
            0x06 => Self::HeartbeatAck,
            0x10 => Self::PlayerJoin,
            0x11 => Self::PlayerLeave,
            0x12 => Self::PlayerState,
            0x13 => Self::PlayerStates,
            0x20 => Self::BlockChange,
            0x21 => Self::ChunkRequest,
            0x22 => Self::ChunkResponse,
            0x30 => Self::TimeSync,
            0x31 => Self::InventorySync,
            _ => return None,
        };
        Some(ty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u8,
    pub message_type: u8,
    pub payload_size: u16,
    pub sequence: u32,
}

impl PacketHeader {
    pub fn new(message_type: MessageType, payload_size: u16, sequence: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            message_type: message_type as u8,
            payload_size,
            sequence,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }

    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_size as usize
    }

    pub fn encode(&self, writer: &mut ByteWriter<'_>) -> CodecResult<()> {
        writer.write_u32(self.magic)?;
        writer.write_u8(self.version)?;
        writer.write_u8(self.message_type)?;
        writer.write_u16(self.payload_size)?;
        writer.write_u32(self.sequence)
    }

    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        let mut reader = ByteReader::new(data);
        Ok(Self {
            magic: reader.read_u32()?,
            version: reader.read_u8()?,
            message_type: reader.read_u8()?,
            payload_size: reader.read_u16()?,
            sequence: reader.read_u32()?,
        })
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PlayerFlags: u8 {
        const FLYING = 1 << 0;
        const GROUNDED = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerState {
    pub id: u8,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub flags: PlayerFlags,
    pub selected_slot: u8,
}

impl PlayerState {
    pub fn new(id: u8, position: Vec3) -> Self {
        Self {
            id,
            position,
            ..Default::default()
        }
    }

    fn encode(&self, writer: &mut ByteWriter<'_>) -> CodecResult<()> {
        writer.write_u8(self.id)?;
        write_vec3(writer, self.position)?;
        write_vec3(writer, self.velocity)?;
        writer.write_f32(self.yaw)?;
        writer.write_f32(self.pitch)?;
        writer.write_u8(self.flags.bits())?;
        writer.write_u8(self.selected_slot)
    }

    fn decode(reader: &mut ByteReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            id: reader.read_u8()?,
            position: read_vec3(reader)?,
            velocity: read_vec3(reader)?,
            yaw: reader.read_f32()?,
            pitch: reader.read_f32()?,
            flags: PlayerFlags::from_bits_retain(reader.read_u8()?),
            selected_slot: reader.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEdit {
    pub position: IVec3,
    pub block: Block,
    pub author_id: u8,
}

impl BlockEdit {
    pub fn new(position: IVec3, block: Block, author_id: u8) -> Self {
        Self {
            position,
            block,
            author_id,
        }
    }

    pub fn distance_to(&self, from: Vec3) -> f32 {
        self.position.as_vec3().distance(from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ServerFull,
    InvalidName,
    AlreadyAuthenticated,
    Other(u8),
}

impl RejectReason {
    pub fn code(self) -> u8 {
        match self {
            RejectReason::ServerFull => 1,
            RejectReason::InvalidName => 2,
            RejectReason::AlreadyAuthenticated => 3,
            RejectReason::Other(code) => code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => RejectReason::ServerFull,
            2 => RejectReason::InvalidName,
            3 => RejectReason::AlreadyAuthenticated,
            other => RejectReason::Other(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::ServerFull => "server is full",
            RejectReason::InvalidName => "invalid player name",
            RejectReason::AlreadyAuthenticated => "already connected",
            RejectReason::Other(_) => "rejected by server",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ConnectRequest {
        name: String,
    },
    ConnectAccept {
        client_id: u8,
        world_seed: u32,
        time_of_day: f32,
        player_count: u8,
    },
    ConnectReject {
        reason: RejectReason,
    },
    Disconnect,
    Heartbeat {
        timestamp_ms: u32,
    },
    HeartbeatAck {
        timestamp_ms: u32,
    },
    PlayerJoin {
        id: u8,
        name: String,
        position: Vec3,
    },
    PlayerLeave {
        id: u8,
    },
    PlayerState(PlayerState),
    PlayerStates(Vec<PlayerState>),
    BlockChange(BlockEdit),
    ChunkRequest {
        chunk: IVec3,
    },
    ChunkResponse {
        data: Vec<u8>,
    },
    TimeSync {
        time_of_day: f32,
    },
    InventorySync {
        data: Vec<u8>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("malformed payload: {0}")]
    Codec(#[from] CodecError),
    #[error("unknown message type 0x{0:02x}")]
    UnknownType(u8),
    #[error("payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(usize),
    #[error("batch of {0} player states exceeds the frame limit")]
    BatchTooLarge(usize),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::ConnectRequest { .. } => MessageType::ConnectRequest,
            Message::ConnectAccept { .. } => MessageType::ConnectAccept,
            Message::ConnectReject { .. } => MessageType::ConnectReject,
            Message::Disconnect => MessageType::Disconnect,
            Message::Heartbeat { .. } => MessageType::Heartbeat,
            Message::HeartbeatAck { .. } => MessageType::HeartbeatAck,
            Message::PlayerJoin { .. } => MessageType::PlayerJoin,
            Message::PlayerLeave { .. } => MessageType::PlayerLeave,
            Message::PlayerState(_) => MessageType::PlayerState,
            Message::PlayerStates(_) => MessageType::PlayerStates,
            Message::BlockChange(_) => MessageType::BlockChange,
            Message::ChunkRequest { .. } => MessageType::ChunkRequest,
            Message::ChunkResponse { .. } => MessageType::ChunkResponse,
            Message::TimeSync { .. } => MessageType::TimeSync,
            Message::InventorySync { .. } => MessageType::InventorySync,
        }
    }

    pub fn payload_len(&self) -> usize {
        match self {
            Message::ConnectRequest { .. } => NAME_LEN,
            Message::ConnectAccept { .. } => 1 + 4 + 4 + 1,
            Message::ConnectReject { .. } => 1,
            Message::Disconnect => 0,
            Message::Heartbeat { .. } | Message::HeartbeatAck { .. } => 4,
            Message::PlayerJoin { .. } => 1 + NAME_LEN + 12,
            Message::PlayerLeave { .. } => 1,
            Message::PlayerState(_) => PLAYER_STATE_SIZE,
            Message::PlayerStates(states) => 1 + states.len() * PLAYER_STATE_SIZE,
            Message::BlockChange(_) => BLOCK_EDIT_SIZE,
            Message::ChunkRequest { .. } => 12,
            Message::ChunkResponse { data } | Message::InventorySync { data } => data.len(),
            Message::TimeSync { .. } => 4,
        }
    }

    pub fn encode_payload(&self, writer: &mut ByteWriter<'_>) -> Result<(), PacketError> {
        match self {
            Message::ConnectRequest { name } => writer.write_fixed_str(name, NAME_LEN)?,
            Message::ConnectAccept {
                client_id,
                world_seed,
                time_of_day,
                player_count,
            } => {
                writer.write_u8(*client_id)?;
                writer.write_u32(*world_seed)?;
                writer.write_f32(*time_of_day)?;
                writer.write_u8(*player_count)?;
            }
            Message::ConnectReject { reason } => writer.write_u8(reason.code())?,
            Message::Disconnect => {}
            Message::Heartbeat { timestamp_ms } | Message::HeartbeatAck { timestamp_ms } => {
                writer.write_u32(*timestamp_ms)?
            }
            Message::PlayerJoin { id, name, position } => {
                writer.write_u8(*id)?;
                writer.write_fixed_str(name, NAME_LEN)?;
                write_vec3(writer, *position)?;
            }
            Message::PlayerLeave { id } => writer.write_u8(*id)?,
            Message::PlayerState(state) => state.encode(writer)?,
            Message::PlayerStates(states) => {
                let count =
                    u8::try_from(states.len()).map_err(|_| PacketError::BatchTooLarge(states.len()))?;
                writer.write_u8(count)?;
                for state in states {
                    state.encode(writer)?;
                }
            }
            Message::BlockChange(edit) => {
                write_ivec3(writer, edit.position)?;
                writer.write_u16(edit.block.block_type)?;
                writer.write_u8(edit.block.metadata)?;
                writer.write_u8(edit.author_id)?;
            }
            Message::ChunkRequest { chunk } => write_ivec3(writer, *chunk)?,
            Message::ChunkResponse { data } | Message::InventorySync { data } => {
                writer.write_bytes(data)?
            }
            Message::TimeSync { time_of_day } => writer.write_f32(*time_of_day)?,
        }
        Ok(())
    }

    /// Decodes a payload whose length was already bounded by the header.
    /// Trailing bytes past the fixed layout are ignored.
    pub fn decode(message_type: u8, payload: &[u8]) -> Result<Self, PacketError> {
        let ty = MessageType::from_u8(message_type).ok_or(PacketError::UnknownType(message_type))?;
        let mut reader = ByteReader::new(payload);

        let message = match ty {
            MessageType::ConnectRequest => Message::ConnectRequest {
                name: reader.read_fixed_str(NAME_LEN)?,
            },
            MessageType::ConnectAccept => Message::ConnectAccept {
                client_id: reader.read_u8()?,
                world_seed: reader.read_u32()?,
                time_of_day: reader.read_f32()?,
                player_count: reader.read_u8()?,
            },
            MessageType::ConnectReject => Message::ConnectReject {
                reason: RejectReason::from_code(reader.read_u8()?),
            },
            MessageType::Disconnect => Message::Disconnect,
            MessageType::Heartbeat => Message::Heartbeat {
                timestamp_ms: reader.read_u32()?,
            },
            MessageType::HeartbeatAck => Message::HeartbeatAck {
                timestamp_ms: reader.read_u32()?,
            },
            MessageType::PlayerJoin => Message::PlayerJoin {
                id: reader.read_u8()?,
                name: reader.read_fixed_str(NAME_LEN)?,
                position: read_vec3(&mut reader)?,
            },
            MessageType::PlayerLeave => Message::PlayerLeave {
                id: reader.read_u8()?,
            },
            MessageType::PlayerState => Message::PlayerState(PlayerState::decode(&mut reader)?),
            MessageType::PlayerStates => {
                let count = reader.read_u8()? as usize;
                let mut states = Vec::with_capacity(count);
                for _ in 0..count {
                    states.push(PlayerState::decode(&mut reader)?);
                }
                Message::PlayerStates(states)
            }
            MessageType::BlockChange => Message::BlockChange(BlockEdit {
                position: read_ivec3(&mut reader)?,
                block: Block {
                    block_type: reader.read_u16()?,
                    metadata: reader.read_u8()?,
                },
                author_id: reader.read_u8()?,
            }),
            MessageType::ChunkRequest => Message::ChunkRequest {
                chunk: read_ivec3(&mut reader)?,
            },
            MessageType::ChunkResponse => Message::ChunkResponse {
                data: reader.read_rest().to_vec(),
            },
            MessageType::TimeSync => Message::TimeSync {
                time_of_day: reader.read_f32()?,
            },
            MessageType::InventorySync => Message::InventorySync {
                data: reader.read_rest().to_vec(),
            },
        };

        Ok(message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: PacketHeader,
    pub message: Message,
}

impl Packet {
    pub fn new(message: Message, sequence: u32) -> Result<Self, PacketError> {
        let len = message.payload_len();
        if len > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge(len));
        }
        let header = PacketHeader::new(message.message_type(), len as u16, sequence);
        Ok(Self { header, message })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let mut buf = vec![0u8; self.header.frame_len()];
        let mut writer = ByteWriter::new(&mut buf);
        self.header.encode(&mut writer)?;
        self.message.encode_payload(&mut writer)?;
        Ok(buf)
    }
}

/// Serializes `message` as a complete frame with the given sequence number.
pub fn encode_frame(message: &Message, sequence: u32) -> Result<Vec<u8>, PacketError> {
    Packet::new(message.clone(), sequence)?.serialize()
}

fn write_vec3(writer: &mut ByteWriter<'_>, v: Vec3) -> CodecResult<()> {
    writer.write_f32(v.x)?;
    writer.write_f32(v.y)?;
    writer.write_f32(v.z)
}

fn read_vec3(reader: &mut ByteReader<'_>) -> CodecResult<Vec3> {
    Ok(Vec3::new(reader.read_f32()?, reader.read_f32()?, reader.read_f32()?))
}

fn write_ivec3(writer: &mut ByteWriter<'_>, v: IVec3) -> CodecResult<()> {
    writer.write_i32(v.x)?;
    writer.write_i32(v.y)?;
    writer.write_i32(v.z)
}

fn read_ivec3(reader: &mut ByteReader<'_>) -> CodecResult<IVec3> {
    Ok(IVec3::new(reader.read_i32()?, reader.read_i32()?, reader.read_i32()?))
}
