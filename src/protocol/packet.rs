//! NRPE packet encode/decode.
//!
//! A packet is either decoded from the 1036 bytes read off a connection (a
//! request) or built from a result code and text (a response). The CRC is
//! computed once at construction and the packet is immutable afterwards.
//!
//! # Example
//!
//! ```
//! use nrpe_agent::protocol::{NrpePacket, PacketVersion, PerformanceData, ResultCode};
//!
//! let perf = PerformanceData::new().with("a", 1);
//! let reply = NrpePacket::response(PacketVersion::V2, ResultCode::Ok, "OK - fine", &perf).unwrap();
//! let bytes = reply.to_bytes();
//! assert_eq!(bytes.len(), 1036);
//!
//! let raw: [u8; 1036] = bytes[..].try_into().unwrap();
//! let decoded = NrpePacket::decode(&raw);
//! assert_eq!(decoded.text(), "OK - fine | a=1");
//! assert!(decoded.crc_matches());
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::crc::checksum;
use super::perf_data::PerformanceData;
use super::wire_format::{
    PacketType, PacketVersion, ResultCode, BUFFER_SIZE, CRC_OFFSET, PACKET_SIZE, RESERVED_SIZE,
};
use crate::error::{NrpeError, Result};

/// A complete NRPE packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NrpePacket {
    version: i16,
    packet_type: i16,
    crc32: u32,
    result_code: i16,
    buffer: Bytes,
    reserved: [u8; RESERVED_SIZE],
}

impl NrpePacket {
    /// Build a packet from its fields and compute its CRC.
    ///
    /// Fails with [`NrpeError::PayloadTooLarge`] if `text` does not fit into
    /// the 1024-byte buffer. Text is never silently truncated.
    pub fn new(
        version: PacketVersion,
        packet_type: PacketType,
        result_code: ResultCode,
        text: &str,
    ) -> Result<Self> {
        let text = text.as_bytes();
        if text.len() > BUFFER_SIZE {
            return Err(NrpeError::PayloadTooLarge {
                len: text.len(),
                capacity: BUFFER_SIZE,
            });
        }
        Ok(Self::filled(version, packet_type, result_code, text))
    }

    /// UNKNOWN response carrying a fixed message. Cannot fail.
    ///
    /// Meant for static fallback texts; anything past the buffer capacity is
    /// cut off.
    pub fn unknown(version: PacketVersion, text: &'static str) -> Self {
        let text = text.as_bytes();
        let text = &text[..text.len().min(BUFFER_SIZE)];
        Self::filled(version, PacketType::Response, ResultCode::Unknown, text)
    }

    /// Zero-pad `text` into the buffer and compute the CRC. `text` must fit.
    fn filled(
        version: PacketVersion,
        packet_type: PacketType,
        result_code: ResultCode,
        text: &[u8],
    ) -> Self {
        let mut buffer = BytesMut::zeroed(BUFFER_SIZE);
        buffer[..text.len()].copy_from_slice(text);

        let mut packet = Self {
            version: version as i16,
            packet_type: packet_type as i16,
            crc32: 0,
            result_code: result_code.as_raw(),
            buffer: buffer.freeze(),
            reserved: [0; RESERVED_SIZE],
        };
        packet.crc32 = packet.compute_crc();
        packet
    }

    /// Build a response carrying `status_text` plus the performance data suffix.
    pub fn response(
        version: PacketVersion,
        result_code: ResultCode,
        status_text: &str,
        performance_data: &PerformanceData,
    ) -> Result<Self> {
        let text = format!("{}{}", status_text, performance_data.suffix());
        Self::new(version, PacketType::Response, result_code, &text)
    }

    /// Build a query for `command`. Result code is zero on queries.
    pub fn query(version: PacketVersion, command: &str) -> Result<Self> {
        Self::new(version, PacketType::Query, ResultCode::Ok, command)
    }

    /// Decode a packet from exactly [`PACKET_SIZE`] bytes.
    ///
    /// The embedded CRC is kept as received and not verified here.
    pub fn decode(bytes: &[u8; PACKET_SIZE]) -> Self {
        let mut buf = &bytes[..];
        let version = buf.get_i16();
        let packet_type = buf.get_i16();
        let crc32 = buf.get_u32();
        let result_code = buf.get_i16();
        let buffer = buf.copy_to_bytes(BUFFER_SIZE);
        let mut reserved = [0u8; RESERVED_SIZE];
        buf.copy_to_slice(&mut reserved);

        Self {
            version,
            packet_type,
            crc32,
            result_code,
            buffer,
            reserved,
        }
    }

    /// Encode the packet with its stored CRC, ready to write to the wire.
    pub fn to_bytes(&self) -> Bytes {
        self.layout(self.crc32).freeze()
    }

    /// Lay out all fields in wire order with the given CRC value.
    fn layout(&self, crc: u32) -> BytesMut {
        let mut buf = BytesMut::with_capacity(PACKET_SIZE);
        buf.put_i16(self.version);
        buf.put_i16(self.packet_type);
        buf.put_u32(crc);
        buf.put_i16(self.result_code);
        buf.put_slice(&self.buffer);
        buf.put_slice(&self.reserved);
        debug_assert_eq!(buf.len(), PACKET_SIZE);
        buf
    }

    /// CRC over the full encoding with the CRC field zeroed.
    pub fn compute_crc(&self) -> u32 {
        checksum(&self.layout(0))
    }

    /// Whether the stored CRC matches the packet contents.
    pub fn crc_matches(&self) -> bool {
        self.crc32 == self.compute_crc()
    }

    /// A legal query has version 1..=3 and type Query.
    pub fn is_legal_query(&self) -> bool {
        PacketVersion::is_supported(self.version)
            && PacketType::from_raw(self.packet_type) == Some(PacketType::Query)
    }

    /// Buffer text up to the first NUL, lossily decoded.
    pub fn text(&self) -> String {
        let end = self
            .buffer
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.buffer.len());
        String::from_utf8_lossy(&self.buffer[..end]).into_owned()
    }

    /// Command name carried by a query: buffer text with padding trimmed.
    pub fn command(&self) -> String {
        self.text().trim().to_string()
    }

    #[inline]
    pub fn version(&self) -> i16 {
        self.version
    }

    #[inline]
    pub fn packet_type(&self) -> i16 {
        self.packet_type
    }

    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    #[inline]
    pub fn result_code(&self) -> ResultCode {
        ResultCode::from_raw(self.result_code)
    }

    #[inline]
    pub fn raw_result_code(&self) -> i16 {
        self.result_code
    }

    #[inline]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub fn reserved(&self) -> [u8; RESERVED_SIZE] {
        self.reserved
    }
}

/// Encode a complete response buffer (standalone function).
pub fn encode(
    version: PacketVersion,
    packet_type: PacketType,
    result_code: ResultCode,
    status_text: &str,
    performance_data: &PerformanceData,
) -> Result<Bytes> {
    let text = format!("{}{}", status_text, performance_data.suffix());
    Ok(NrpePacket::new(version, packet_type, result_code, &text)?.to_bytes())
}

/// Decode a packet from bytes (standalone function).
#[inline]
pub fn decode(bytes: &[u8; PACKET_SIZE]) -> NrpePacket {
    NrpePacket::decode(bytes)
}

/// Zero the CRC field of an encoded packet in place.
pub fn zero_crc(bytes: &mut [u8; PACKET_SIZE]) {
    bytes[CRC_OFFSET..CRC_OFFSET + 4].fill(0);
}

/// Render bytes as lowercase hex for trace logging.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
