//! Shared `#[serde(with = "...")]` helper modules.

/// Serialize as hex string (human-readable) / raw bytes (binary).
pub mod hexstr_or_bytes;
