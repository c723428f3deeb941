//! Normalisation of untrusted identifiers before they become map keys.

use std::net::IpAddr;

/// Longest caller key accepted as a lookup key.
pub const MAX_KEY_LEN: usize = 128;

/// Parse an IPv4/IPv6 address and return its canonical text form.
///
/// IPv4-mapped IPv6 addresses collapse to plain IPv4 so `::ffff:10.0.0.1`
/// and `10.0.0.1` share one entry.
pub fn normalize_ip(raw: &str) -> Option<String> {
    raw.trim()
        .parse::<IpAddr>()
        .ok()
        .map(|ip| ip.to_canonical().to_string())
}

/// Accept a caller key only if it is non-empty, bounded and printable ASCII.
pub fn sanitize_key(raw: &str) -> Option<&str> {
    let key = raw.trim();
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.bytes().all(|b| b.is_ascii_graphic());
    valid.then_some(key)
}

/// Key used for lockout bookkeeping: the canonical IP, else the sanitised
/// string, else a shared bucket for unparseable input.
pub fn lockout_key(raw: &str) -> String {
    normalize_ip(raw)
        .or_else(|| sanitize_key(raw).map(str::to_owned))
        .unwrap_or_else(|| "invalid".to_owned())
}
