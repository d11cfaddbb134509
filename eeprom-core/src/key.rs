//! Grouped-key resolution shared by the TLV datamodels.
//!
//! A grouped property is addressed as `PATTERN_param` (e.g. `MAC_ADDR_eth0`).
//! [`split_group_key`] performs the syntactic half of that (pulling `param`
//! out given the pattern prefix); the model itself performs the semantic
//! half (scanning its slot range for an occupied record whose stored
//! parameter matches).

/// Splits `key` into `(param)` if it starts with `pattern` followed by `_`.
pub fn split_group_key<'a>(key: &'a str, pattern: &str) -> Option<&'a str> {
    key.strip_prefix(pattern)?.strip_prefix('_')
}
