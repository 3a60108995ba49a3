//! Matter protocol numbers: `MAT-` followed by a six-digit sequence.
//!
//! A new number is derived from the highest existing one; the store runs the
//! lookup and the insert in one transaction and the column is unique.

use crate::CoreError;

pub const PREFIX: &str = "MAT-";

/// Render sequence `n` as a protocol number.
pub fn format(n: u64) -> String {
    format!("{PREFIX}{n:06}")
}

/// Numeric part of a protocol number.
pub fn parse(protocol: &str) -> Result<u64, CoreError> {
    protocol
        .strip_prefix(PREFIX)
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| CoreError::InvalidProtocol(protocol.to_string()))
}

/// Next number after `latest`; the first matter gets `MAT-000001`.
///
/// A malformed latest value restarts from 1 rather than failing the insert;
/// the unique column then reports any clash.
pub fn next(latest: Option<&str>) -> String {
    let n = match latest.map(parse) {
        Some(Ok(n)) => n + 1,
        Some(Err(err)) => {
            tracing::warn!(%err, "unparseable latest protocol number, restarting sequence");
            1
        }
        None => 1,
    };
    format(n)
}

/// The highest-numbered protocol among `numbers`.
pub fn highest<'a>(numbers: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    numbers
        .into_iter()
        .filter_map(|p| parse(p).ok().map(|n| (n, p)))
        .max_by_key(|(n, _)| *n)
        .map(|(_, p)| p)
}
