//! Pool tag encoding.
//!
//! Pool tags are stored as little-endian `u32` values, so a human readable tag must be written
//! into `nt!PoolHitTag` with its characters in reverse order.

/// Reverse the character order of a tag. Input is not validated.
pub fn encode(tag: &str) -> String {
    tag.chars().rev().collect()
}

/// Render a command that writes an encoded tag into the trigger symbol.
///
/// # Arguments
///
/// * `symbol`: trigger symbol, `nt!PoolHitTag` by default
/// * `tag`: human readable pool tag
pub fn trigger_command(symbol: &str, tag: &str) -> String {
    format!("ed {symbol} '{}'", encode(tag))
}
