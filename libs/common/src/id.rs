use std::fmt::Write;

use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes behind every generated id.
const ID_BYTES: usize = 12;

/// Generates a new opaque id: 12 bytes from the OS CSPRNG rendered as 24
/// lowercase hex digits.
///
/// # Examples
/// ```
/// let id = sonora_common::id::hex_id();
/// assert_eq!(id.len(), 24);
/// assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn hex_id() -> String {
    let mut buf = [0u8; ID_BYTES];
    OsRng.fill_bytes(&mut buf);
    buf.iter().fold(String::with_capacity(ID_BYTES * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
