//! # Relay Wire Protocol
//!
//! Byte-exact codec for the datagrams exchanged between the relay server and
//! the native game clients. The layout is fixed by the existing client and
//! must not drift:
//!
//! - every packet starts with an 8 byte header: type code (`i32`) followed by
//!   the total packet length including the header (`u32`)
//! - all integers are little-endian, no alignment padding anywhere
//! - text fields are fixed width and NUL padded
//!
//! Each packet type has a fixed total size. Decoding checks the header's
//! length against the datagram first, then requires at least the fixed size;
//! anything past the fixed size is ignored.

use bytes::{Buf, BufMut, BytesMut};

mod error;
mod packets;

pub use error::CodecError;
pub use packets::{
    ChatMessage, Color, Connect, ConnectAcknowledge, CreateShip, CreateStar, DeleteShip,
    Disconnect, Packet, PlayerChatEnter, ShipUpdate, WirePacket,
};

/// Size of the type + length header in bytes.
pub const HEADER_SIZE: usize = 8;
/// Width of the player name field in a Connect packet.
pub const NAME_LEN: usize = 64;
/// Width of the text field in chat packets.
pub const MESSAGE_LEN: usize = 512;
/// Size of an encoded [`Pose`].
pub const POSE_SIZE: usize = 14 * 4;
/// Ship IDs live in `[0, SHIP_ID_LIMIT)`.
pub const SHIP_ID_LIMIT: i32 = 65535;
/// Owner value for ships that no client controls.
pub const NO_OWNER: i32 = -1;
/// Port the native client dials by default.
pub const DEFAULT_PORT: u16 = 13337;

/// Packet type codes as the native client numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PacketType {
    Connect = 0,
    CreateShip = 1,
    DeleteShip = 2,
    CreateStar = 3,
    ShipUpdate = 4,
    ConnectAcknowledge = 5,
    ChatMessage = 6,
    PlayerChatEnter = 7,
    Disconnect = 8,
}

impl PacketType {
    /// Total encoded size of this packet type, header included.
    pub const fn wire_size(self) -> usize {
        match self {
            PacketType::Connect => HEADER_SIZE + 2 + NAME_LEN,
            PacketType::CreateShip => HEADER_SIZE + 3 * 4 + POSE_SIZE,
            PacketType::DeleteShip => HEADER_SIZE + 4,
            PacketType::CreateStar => HEADER_SIZE + 5 * 4,
            PacketType::ShipUpdate => HEADER_SIZE + 4 + POSE_SIZE,
            PacketType::ConnectAcknowledge => HEADER_SIZE + 2 * 4,
            PacketType::ChatMessage => HEADER_SIZE + 4 + MESSAGE_LEN,
            PacketType::PlayerChatEnter => HEADER_SIZE + MESSAGE_LEN,
            PacketType::Disconnect => HEADER_SIZE,
        }
    }

    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for PacketType {
    type Error = CodecError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        let packet_type = match code {
            0 => PacketType::Connect,
            1 => PacketType::CreateShip,
            2 => PacketType::DeleteShip,
            3 => PacketType::CreateStar,
            4 => PacketType::ShipUpdate,
            5 => PacketType::ConnectAcknowledge,
            6 => PacketType::ChatMessage,
            7 => PacketType::PlayerChatEnter,
            8 => PacketType::Disconnect,
            other => return Err(CodecError::UnknownPacketType(other)),
        };
        Ok(packet_type)
    }
}

/// The leading 8 bytes of every packet.
///
/// The type code is kept raw so the router can report codes it does not
/// know without first failing the header decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub type_code: i32,
    pub length: u32,
}

impl PacketHeader {
    /// Header for a freshly encoded packet of the given type.
    pub fn for_type(packet_type: PacketType) -> Self {
        Self {
            type_code: packet_type.code(),
            length: packet_type.wire_size() as u32,
        }
    }

    /// Reads just the header, leaving the payload untouched.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < HEADER_SIZE {
            return Err(CodecError::Truncated {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }
        let mut cursor = buf;
        Ok(Self {
            type_code: cursor.get_i32_le(),
            length: cursor.get_u32_le(),
        })
    }

    /// Resolves the raw type code.
    ///
    /// Fails with [`CodecError::UnknownPacketType`] for codes outside 0-8;
    /// the length is not checked here, see [`validate`](Self::validate).
    pub fn packet_type(&self) -> Result<PacketType, CodecError> {
        PacketType::try_from(self.type_code)
    }

    /// Checks the header against a datagram of `received` bytes.
    ///
    /// The declared length must equal the datagram length and cover at least
    /// the fixed size of the named packet type.
    pub fn validate(&self, received: usize) -> Result<PacketType, CodecError> {
        if self.length as usize != received {
            return Err(CodecError::LengthMismatch {
                declared: self.length,
                actual: received,
            });
        }
        let packet_type = self.packet_type()?;
        if received < packet_type.wire_size() {
            return Err(CodecError::Truncated {
                expected: packet_type.wire_size(),
                actual: received,
            });
        }
        Ok(packet_type)
    }

    /// Appends the eight header bytes: type code then length, both little-endian.
    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.type_code);
        buf.put_u32_le(self.length);
    }
}

/// Position and orientation of a ship, all fixed-point `i32`s.
///
/// Field order is the wire order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Pose {
    pub pos_x: i32,
    pub pos_y: i32,
    pub pos_z: i32,
    pub rot_x: i32,
    pub rot_y: i32,
    pub rot_z: i32,
    pub rot_w: i32,
    pub up_x: i32,
    pub up_y: i32,
    pub up_z: i32,
    pub up_w: i32,
    pub look_at_x: i32,
    pub look_at_y: i32,
    pub look_at_z: i32,
}

impl Pose {
    /// Pose at the given position with every orientation component zeroed.
    pub fn at(pos_x: i32, pos_y: i32, pos_z: i32) -> Self {
        Self {
            pos_x,
            pos_y,
            pos_z,
            ..Self::default()
        }
    }

    pub fn write(&self, buf: &mut BytesMut) {
        for value in [
            self.pos_x,
            self.pos_y,
            self.pos_z,
            self.rot_x,
            self.rot_y,
            self.rot_z,
            self.rot_w,
            self.up_x,
            self.up_y,
            self.up_z,
            self.up_w,
            self.look_at_x,
            self.look_at_y,
            self.look_at_z,
        ] {
            buf.put_i32_le(value);
        }
    }

    /// Reads 14 integers; the caller guarantees `POSE_SIZE` bytes remain.
    pub fn read(buf: &mut &[u8]) -> Self {
        Self {
            pos_x: buf.get_i32_le(),
            pos_y: buf.get_i32_le(),
            pos_z: buf.get_i32_le(),
            rot_x: buf.get_i32_le(),
            rot_y: buf.get_i32_le(),
            rot_z: buf.get_i32_le(),
            rot_w: buf.get_i32_le(),
            up_x: buf.get_i32_le(),
            up_y: buf.get_i32_le(),
            up_z: buf.get_i32_le(),
            up_w: buf.get_i32_le(),
            look_at_x: buf.get_i32_le(),
            look_at_y: buf.get_i32_le(),
            look_at_z: buf.get_i32_le(),
        }
    }
}

/// Writes `text` into a NUL padded field of `width` bytes.
///
/// At least one trailing NUL is always kept, so over-long text is cut on the
/// last char boundary that fits in `width - 1` bytes.
pub fn put_fixed_text(buf: &mut BytesMut, text: &str, width: usize) {
    let mut end = text.len().min(width.saturating_sub(1));
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    buf.put_slice(&text.as_bytes()[..end]);
    buf.put_bytes(0, width - end);
}

/// Reads a NUL padded field of `width` bytes, stopping at the first NUL.
///
/// Invalid UTF-8 is replaced rather than rejected; the native client writes
/// whatever the game hands it.
pub fn get_fixed_text(buf: &mut &[u8], width: usize) -> String {
    let field = &buf[..width];
    let end = field.iter().position(|&b| b == 0).unwrap_or(width);
    let text = String::from_utf8_lossy(&field[..end]).into_owned();
    buf.advance(width);
    text
}
