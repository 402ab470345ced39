//! CRC-32 used for NRPE packet integrity.
//!
//! Standard reflected CRC-32 (polynomial `0xEDB88320`), table driven. The
//! 256-entry table is built at compile time and lives for the whole process.

/// Reflected CRC-32 polynomial.
pub const CRC32_POLYNOMIAL: u32 = 0xEDB8_8320;

static CRC32_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32_POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the CRC-32 of a byte buffer.
///
/// # Example
///
/// ```
/// use nrpe_agent::protocol::checksum;
///
/// assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
/// ```
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut reg: u32 = 0xFFFF_FFFF;
    for &byte in bytes {
        reg = ((reg >> 8) & 0x00FF_FFFF) ^ CRC32_TABLE[((reg ^ byte as u32) & 0xFF) as usize];
    }
    reg ^ 0xFFFF_FFFF
}
