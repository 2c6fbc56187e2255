//! Shared protocol constants for the pcc framed transport
//!
//! One request/response per connection, network byte order throughout:
//! client sends `N` (u32) then `N` payload bytes, server replies with `C` (u32).

// Size of every length/count field on the wire
pub const LEN_PREFIX_BYTES: usize = 4;

// Listen backlog; a second client queues here while the first is served
pub const DEFAULT_BACKLOG: i32 = 10;

// Printable ASCII range, inclusive (space through tilde)
pub const PRINTABLE_MIN: u8 = 32;
pub const PRINTABLE_MAX: u8 = 126;
pub const PRINTABLE_COUNT: usize = (PRINTABLE_MAX - PRINTABLE_MIN) as usize + 1;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
}

/// Encode a length or count field in network byte order
pub fn encode_u32(value: u32) -> [u8; LEN_PREFIX_BYTES] {
    value.to_be_bytes()
}

/// Decode a length or count field from network byte order
pub fn decode_u32(bytes: &[u8; LEN_PREFIX_BYTES]) -> u32 {
    u32::from_be_bytes(*bytes)
}
