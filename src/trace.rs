//! Stable trace ids for log correlation.

use sha2::{Digest, Sha256};

/// Length of a trace id in hex characters.
pub const TRACE_ID_LEN: usize = 12;

/// Short deterministic hash of `text`.
///
/// Lets log lines for the same query be grouped without storing the query.
pub fn trace_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..TRACE_ID_LEN / 2])
}
