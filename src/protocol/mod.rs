//! Protocol module - NRPE wire format, CRC and packet codec.
//!
//! This module implements the fixed-size NRPE v2 packet:
//! - 1036-byte layout with Big Endian integer fields
//! - CRC-32 over the whole packet with the CRC field zeroed
//! - Ordered performance data rendered into the reply text

mod crc;
mod packet;
mod perf_data;
mod wire_format;

pub use crc::{checksum, CRC32_POLYNOMIAL};
pub use packet::{decode, encode, hex_dump, zero_crc, NrpePacket};
pub use perf_data::PerformanceData;
pub use wire_format::{
    PacketType, PacketVersion, ResultCode, BUFFER_OFFSET, BUFFER_SIZE, CRC_OFFSET,
    DEFAULT_NRPE_PORT, PACKET_SIZE, RESERVED_OFFSET, RESERVED_SIZE, RESULT_CODE_OFFSET,
    TYPE_OFFSET, VERSION_OFFSET,
};
