//! Random prefix generation for transaction sets.
//!
//! A per-set prefix is a cryptographically random 16-byte value rendered
//! as five hyphenated lower-case hex groups (8-4-4-4-12), with the usual
//! version-4 / variant-1 bits masked in, the same shape as a random UUID,
//! without pulling in a `uuid` dependency for a handful of lines of hex
//! formatting.
//!
//! A random prefix is used instead of process-id-plus-counter because the
//! latter is reused on busy hosts, where the log directory may still
//! contain a set from a previous process with the same id.

use rand::RngCore;

/// Generate a fresh 36-character random prefix.
pub fn generate() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);

    // Mark as version 4 (random), variant 1, matching RFC 4122 layout.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    format_hyphenated(&bytes)
}

fn format_hyphenated(bytes: &[u8; 16]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
