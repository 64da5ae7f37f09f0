// Byte runs that signing tools leave inside the encapsulated content of a .p7m.
//
// When the signed PDF is stored as a constructed OCTET STRING, every chunk is
// prefixed with `04 82 hi lo` (primitive OCTET STRING, two-byte long-form
// length). The lengths below are the ones observed in real envelopes; any
// other chunk size passes through untouched.

/// Bumped whenever the table contents or order change.
pub const STRIP_TABLE_VERSION: u32 = 1;

pub const PATTERN_LEN: usize = 4;

pub type StripPattern = [u8; PATTERN_LEN];

/// DER tag of a primitive OCTET STRING.
const OCTET_STRING_TAG: u8 = 0x04;
/// Long-form length marker announcing two length octets.
const LONG_FORM_TWO_OCTETS: u8 = 0x82;

const fn octet_chunk(hi: u8, lo: u8) -> StripPattern {
    [OCTET_STRING_TAG, LONG_FORM_TWO_OCTETS, hi, lo]
}

/// Order matters: each pattern is stripped from the output of the previous one.
pub static STRIP_PATTERNS: [StripPattern; 45] = [
    octet_chunk(1, 11),
    octet_chunk(1, 67),
    octet_chunk(1, 87),
    octet_chunk(1, 97),
    octet_chunk(1, 115),
    octet_chunk(1, 122),
    octet_chunk(1, 149),
    octet_chunk(1, 154),
    octet_chunk(1, 195),
    octet_chunk(1, 2),
    octet_chunk(1, 253),
    octet_chunk(1, 167),
    octet_chunk(1, 209),
    octet_chunk(1, 246),
    octet_chunk(2, 25),
    octet_chunk(2, 79),
    octet_chunk(2, 105),
    octet_chunk(2, 110),
    octet_chunk(2, 122),
    octet_chunk(2, 144),
    octet_chunk(2, 167),
    octet_chunk(2, 183),
    octet_chunk(2, 202),
    octet_chunk(2, 206),
    octet_chunk(2, 209),
    octet_chunk(2, 245),
    octet_chunk(3, 17),
    octet_chunk(3, 22),
    octet_chunk(3, 30),
    octet_chunk(3, 35),
    octet_chunk(3, 58),
    octet_chunk(3, 70),
    octet_chunk(3, 105),
    octet_chunk(3, 124),
    octet_chunk(3, 148),
    octet_chunk(3, 159),
    octet_chunk(3, 165),
    octet_chunk(3, 179),
    octet_chunk(3, 196),
    octet_chunk(3, 204),
    octet_chunk(3, 205),
    octet_chunk(3, 209),
    octet_chunk(3, 226),
    octet_chunk(3, 232),
    octet_chunk(4, 0),
];

/// Chunk length announced by a pattern, e.g. `04 82 04 00` -> 1024.
pub fn announced_length(pattern: &StripPattern) -> u16 {
    u16::from_be_bytes([pattern[2], pattern[3]])
}
