//! NRPE wire format constants and field enums.
//!
//! Implements the fixed 1036-byte packet layout:
//! ```text
//! ┌─────────┬─────────┬──────────┬─────────┬────────────┬──────────┐
//! │ Version │ Type    │ CRC32    │ Result  │ Buffer     │ Reserved │
//! │ 2 bytes │ 2 bytes │ 4 bytes  │ 2 bytes │ 1024 bytes │ 2 bytes  │
//! │ int16 BE│ int16 BE│ uint32 BE│ int16 BE│ text, NUL  │          │
//! └─────────┴─────────┴──────────┴─────────┴────────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

/// Total packet size in bytes (fixed, exactly 1036).
pub const PACKET_SIZE: usize = 1036;

/// Capacity of the text buffer.
pub const BUFFER_SIZE: usize = 1024;

/// Size of the trailing reserved bytes.
pub const RESERVED_SIZE: usize = 2;

pub const VERSION_OFFSET: usize = 0;
pub const TYPE_OFFSET: usize = 2;
pub const CRC_OFFSET: usize = 4;
pub const RESULT_CODE_OFFSET: usize = 8;
pub const BUFFER_OFFSET: usize = 10;
pub const RESERVED_OFFSET: usize = 1034;

/// Default TCP port for NRPE.
pub const DEFAULT_NRPE_PORT: u16 = 5666;

/// Packet versions this agent accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum PacketVersion {
    V1 = 1,
    V2 = 2,
    V3 = 3,
}

impl PacketVersion {
    /// Check whether a raw version field is one we understand.
    #[inline]
    pub fn is_supported(raw: i16) -> bool {
        (PacketVersion::V1 as i16..=PacketVersion::V3 as i16).contains(&raw)
    }
}

/// Packet type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum PacketType {
    Query = 1,
    Response = 2,
}

impl PacketType {
    /// Map a raw type field, `None` if it is neither query nor response.
    pub fn from_raw(raw: i16) -> Option<Self> {
        match raw {
            1 => Some(PacketType::Query),
            2 => Some(PacketType::Response),
            _ => None,
        }
    }
}

/// Check result code, as understood by Nagios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum ResultCode {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl ResultCode {
    /// Map a raw result code; anything out of range is `Unknown`.
    pub fn from_raw(raw: i16) -> Self {
        match raw {
            0 => ResultCode::Ok,
            1 => ResultCode::Warning,
            2 => ResultCode::Critical,
            _ => ResultCode::Unknown,
        }
    }

    /// Raw wire value.
    #[inline]
    pub fn as_raw(self) -> i16 {
        self as i16
    }

    /// Prefix used in reply text, e.g. `"WARNING"`.
    pub fn label(self) -> &'static str {
        match self {
            ResultCode::Ok => "OK",
            ResultCode::Warning => "WARNING",
            ResultCode::Critical => "CRITICAL",
            ResultCode::Unknown => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_adds_up() {
        assert_eq!(BUFFER_OFFSET + BUFFER_SIZE, RESERVED_OFFSET);
        assert_eq!(RESERVED_OFFSET + RESERVED_SIZE, PACKET_SIZE);
        assert_eq!(PACKET_SIZE, 1036);
    }

    #[test]
    fn test_supported_versions() {
        assert!(!PacketVersion::is_supported(0));
        assert!(PacketVersion::is_supported(1));
        assert!(PacketVersion::is_supported(2));
        assert!(PacketVersion::is_supported(3));
        assert!(!PacketVersion::is_supported(4));
        assert!(!PacketVersion::is_supported(-1));
    }

    #[test]
    fn test_packet_type_from_raw() {
        assert_eq!(PacketType::from_raw(1), Some(PacketType::Query));
        assert_eq!(PacketType::from_raw(2), Some(PacketType::Response));
        assert_eq!(PacketType::from_raw(0), None);
        assert_eq!(PacketType::from_raw(3), None);
    }

    #[test]
    fn test_result_code_out_of_range_is_unknown() {
        assert_eq!(ResultCode::from_raw(0), ResultCode::Ok);
        assert_eq!(ResultCode::from_raw(2), ResultCode::Critical);
        assert_eq!(ResultCode::from_raw(7), ResultCode::Unknown);
        assert_eq!(ResultCode::from_raw(-1), ResultCode::Unknown);
    }

    #[test]
    fn test_result_code_labels() {
        assert_eq!(ResultCode::Ok.label(), "OK");
        assert_eq!(ResultCode::Warning.label(), "WARNING");
        assert_eq!(ResultCode::Critical.label(), "CRITICAL");
        assert_eq!(ResultCode::Unknown.label(), "UNKNOWN");
    }
}
