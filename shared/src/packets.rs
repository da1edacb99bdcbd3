//! Packet catalog. Field order in every `write_body`/`read_body` pair is the
//! wire order and must stay in lockstep with the native client.

use crate::{
    get_fixed_text, put_fixed_text, CodecError, PacketHeader, PacketType, Pose, HEADER_SIZE,
    MESSAGE_LEN, NAME_LEN,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A fixed-layout packet with a known type code.
pub trait WirePacket: Sized {
    const TYPE: PacketType;

    /// Appends the payload (everything after the header).
    fn write_body(&self, buf: &mut BytesMut);

    /// Reads the payload; the caller guarantees the fixed body size is present.
    fn read_body(body: &mut &[u8]) -> Self;

    /// Encodes header and payload into exactly `TYPE.wire_size()` bytes.
    fn encode(&self) -> Bytes {
        let size = Self::TYPE.wire_size();
        let mut buf = BytesMut::with_capacity(size);
        PacketHeader::for_type(Self::TYPE).write(&mut buf);
        self.write_body(&mut buf);
        debug_assert_eq!(buf.len(), size);
        buf.freeze()
    }

    /// Decodes a payload slice, ignoring bytes past the fixed size.
    fn decode_body(body: &[u8]) -> Result<Self, CodecError> {
        let needed = Self::TYPE.wire_size() - HEADER_SIZE;
        if body.len() < needed {
            return Err(CodecError::Truncated {
                expected: Self::TYPE.wire_size(),
                actual: body.len() + HEADER_SIZE,
            });
        }
        let mut cursor = body;
        Ok(Self::read_body(&mut cursor))
    }

    /// Decodes a whole datagram that must carry this packet type.
    fn decode(datagram: &[u8]) -> Result<Self, CodecError> {
        let header = PacketHeader::decode(datagram)?;
        let found = header.validate(datagram.len())?;
        if found != Self::TYPE {
            return Err(CodecError::UnexpectedPacketType {
                expected: Self::TYPE,
                found,
            });
        }
        Self::decode_body(&datagram[HEADER_SIZE..])
    }
}

/// Join request sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub model: i16,
    pub name: String,
}

impl WirePacket for Connect {
    const TYPE: PacketType = PacketType::Connect;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i16_le(self.model);
        put_fixed_text(buf, &self.name, NAME_LEN);
    }

    fn read_body(body: &mut &[u8]) -> Self {
        let model = body.get_i16_le();
        let name = get_fixed_text(body, NAME_LEN);
        Self { model, name }
    }
}

/// Server reply to a successful Connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectAcknowledge {
    pub client_id: i32,
    pub ship_id: i32,
}

impl WirePacket for ConnectAcknowledge {
    const TYPE: PacketType = PacketType::ConnectAcknowledge;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.client_id);
        buf.put_i32_le(self.ship_id);
    }

    fn read_body(body: &mut &[u8]) -> Self {
        Self {
            client_id: body.get_i32_le(),
            ship_id: body.get_i32_le(),
        }
    }
}

/// Announces a ship and its full state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateShip {
    pub ship_id: i32,
    pub model: i32,
    pub owner: i32,
    pub pose: Pose,
}

impl WirePacket for CreateShip {
    const TYPE: PacketType = PacketType::CreateShip;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.ship_id);
        buf.put_i32_le(self.model);
        buf.put_i32_le(self.owner);
        self.pose.write(buf);
    }

    fn read_body(body: &mut &[u8]) -> Self {
        Self {
            ship_id: body.get_i32_le(),
            model: body.get_i32_le(),
            owner: body.get_i32_le(),
            pose: Pose::read(body),
        }
    }
}

/// New pose for one ship, sent by its pilot and relayed to everyone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipUpdate {
    pub ship_id: i32,
    pub pose: Pose,
}

impl WirePacket for ShipUpdate {
    const TYPE: PacketType = PacketType::ShipUpdate;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.ship_id);
        self.pose.write(buf);
    }

    fn read_body(body: &mut &[u8]) -> Self {
        Self {
            ship_id: body.get_i32_le(),
            pose: Pose::read(body),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteShip {
    pub ship_id: i32,
}

impl WirePacket for DeleteShip {
    const TYPE: PacketType = PacketType::DeleteShip;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.ship_id);
    }

    fn read_body(body: &mut &[u8]) -> Self {
        Self {
            ship_id: body.get_i32_le(),
        }
    }
}

/// Announces a station. The client calls these stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateStar {
    pub star_id: i32,
    pub model: i32,
    pub pos_x: i32,
    pub pos_y: i32,
    pub pos_z: i32,
}

impl WirePacket for CreateStar {
    const TYPE: PacketType = PacketType::CreateStar;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.star_id);
        buf.put_i32_le(self.model);
        buf.put_i32_le(self.pos_x);
        buf.put_i32_le(self.pos_y);
        buf.put_i32_le(self.pos_z);
    }

    fn read_body(body: &mut &[u8]) -> Self {
        Self {
            star_id: body.get_i32_le(),
            model: body.get_i32_le(),
            pos_x: body.get_i32_le(),
            pos_y: body.get_i32_le(),
            pos_z: body.get_i32_le(),
        }
    }
}

/// ARGB text color, one byte per channel in A, R, G, B order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        a: 255,
        r: 255,
        g: 255,
        b: 255,
    };
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub color: Color,
    pub message: String,
}

impl WirePacket for ChatMessage {
    const TYPE: PacketType = PacketType::ChatMessage;

    fn write_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.color.a);
        buf.put_u8(self.color.r);
        buf.put_u8(self.color.g);
        buf.put_u8(self.color.b);
        put_fixed_text(buf, &self.message, MESSAGE_LEN);
    }

    fn read_body(body: &mut &[u8]) -> Self {
        let color = Color {
            a: body.get_u8(),
            r: body.get_u8(),
            g: body.get_u8(),
            b: body.get_u8(),
        };
        let message = get_fixed_text(body, MESSAGE_LEN);
        Self { color, message }
    }
}

/// Raw line a player typed into the in-game chat box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerChatEnter {
    pub message: String,
}

impl WirePacket for PlayerChatEnter {
    const TYPE: PacketType = PacketType::PlayerChatEnter;

    fn write_body(&self, buf: &mut BytesMut) {
        put_fixed_text(buf, &self.message, MESSAGE_LEN);
    }

    fn read_body(body: &mut &[u8]) -> Self {
        Self {
            message: get_fixed_text(body, MESSAGE_LEN),
        }
    }
}

/// Header-only goodbye from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Disconnect;

impl WirePacket for Disconnect {
    const TYPE: PacketType = PacketType::Disconnect;

    fn write_body(&self, _buf: &mut BytesMut) {}

    fn read_body(_body: &mut &[u8]) -> Self {
        Disconnect
    }
}

/// Any packet in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    ConnectAcknowledge(ConnectAcknowledge),
    CreateShip(CreateShip),
    ShipUpdate(ShipUpdate),
    DeleteShip(DeleteShip),
    CreateStar(CreateStar),
    ChatMessage(ChatMessage),
    PlayerChatEnter(PlayerChatEnter),
    Disconnect,
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::ConnectAcknowledge(_) => PacketType::ConnectAcknowledge,
            Packet::CreateShip(_) => PacketType::CreateShip,
            Packet::ShipUpdate(_) => PacketType::ShipUpdate,
            Packet::DeleteShip(_) => PacketType::DeleteShip,
            Packet::CreateStar(_) => PacketType::CreateStar,
            Packet::ChatMessage(_) => PacketType::ChatMessage,
            Packet::PlayerChatEnter(_) => PacketType::PlayerChatEnter,
            Packet::Disconnect => PacketType::Disconnect,
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            Packet::Connect(p) => p.encode(),
            Packet::ConnectAcknowledge(p) => p.encode(),
            Packet::CreateShip(p) => p.encode(),
            Packet::ShipUpdate(p) => p.encode(),
            Packet::DeleteShip(p) => p.encode(),
            Packet::CreateStar(p) => p.encode(),
            Packet::ChatMessage(p) => p.encode(),
            Packet::PlayerChatEnter(p) => p.encode(),
            Packet::Disconnect => Disconnect.encode(),
        }
    }

    /// Decodes a full datagram: header, length check, then payload.
    pub fn decode(datagram: &[u8]) -> Result<Packet, CodecError> {
        let header = PacketHeader::decode(datagram)?;
        let packet_type = header.validate(datagram.len())?;
        Self::decode_body(packet_type, &datagram[HEADER_SIZE..])
    }

    /// Decodes a payload once the router already knows its type.
    pub fn decode_body(packet_type: PacketType, body: &[u8]) -> Result<Packet, CodecError> {
        let packet = match packet_type {
            PacketType::Connect => Packet::Connect(Connect::decode_body(body)?),
            PacketType::ConnectAcknowledge => {
                Packet::ConnectAcknowledge(ConnectAcknowledge::decode_body(body)?)
            }
            PacketType::CreateShip => Packet::CreateShip(CreateShip::decode_body(body)?),
            PacketType::ShipUpdate => Packet::ShipUpdate(ShipUpdate::decode_body(body)?),
            PacketType::DeleteShip => Packet::DeleteShip(DeleteShip::decode_body(body)?),
            PacketType::CreateStar => Packet::CreateStar(CreateStar::decode_body(body)?),
            PacketType::ChatMessage => Packet::ChatMessage(ChatMessage::decode_body(body)?),
            PacketType::PlayerChatEnter => {
                Packet::PlayerChatEnter(PlayerChatEnter::decode_body(body)?)
            }
            PacketType::Disconnect => Packet::Disconnect,
        };
        Ok(packet)
    }
}

macro_rules! impl_from_packet {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Packet {
                fn from(packet: $variant) -> Self {
                    Packet::$variant(packet)
                }
            }
        )*
    };
}

impl_from_packet!(
    Connect,
    ConnectAcknowledge,
    CreateShip,
    ShipUpdate,
    DeleteShip,
    CreateStar,
    ChatMessage,
    PlayerChatEnter
);

impl From<Disconnect> for Packet {
    fn from(_: Disconnect) -> Self {
        Packet::Disconnect
    }
}
