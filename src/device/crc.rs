//! CRC-16/CCITT-FALSE as used by timer state frames.
//!
//! Polynomial `0x1021` (normal, MSB-first), initial value `0xFFFF`, no
//! reflection, no final xor.

/// CRC-16/CCITT-FALSE polynomial (normal form).
pub const POLYNOMIAL: u16 = 0x1021;

/// Initial register value.
pub const INIT: u16 = 0xFFFF;

/// Single-byte lookup table (MSB-first).
const TABLE: [u16; 256] = generate_table();

const fn generate_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0usize;

    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;
        while j < 8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }

    table
}

/// Checksum of `bytes`.
///
/// ```
/// use timestat::device::crc16;
///
/// assert_eq!(crc16(b"123456789"), 0x29B1);
/// ```
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(INIT, |crc, &b| {
        (crc << 8) ^ TABLE[usize::from((crc >> 8) as u8 ^ b)]
    })
}
