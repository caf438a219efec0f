//! Dotted object identifier helpers

use super::{SnmpError, SnmpResult};

/// Index of the row `oid` within the table column `base`
///
/// Both arguments may carry a leading dot. Returns `-1` when `oid` is not
/// below `base` or when the last component is not an integer.
pub fn extract_last_oid_index(oid: &str, base: &str) -> i64 {
    let oid = oid.strip_prefix('.').unwrap_or(oid);
    let base = base.strip_prefix('.').unwrap_or(base);

    let Some(suffix) = oid
        .strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('.'))
    else {
        return -1;
    };

    suffix
        .rsplit('.')
        .next()
        .and_then(|last| last.parse().ok())
        .unwrap_or(-1)
}

/// Parse a dotted OID (`1.3.6.1...` or `.1.3.6.1...`) into its arcs
pub fn parse_oid(oid: &str) -> SnmpResult<Vec<u64>> {
    let trimmed = oid.strip_prefix('.').unwrap_or(oid);
    if trimmed.is_empty() {
        return Err(SnmpError::InvalidOid(oid.to_string()));
    }

    trimmed
        .split('.')
        .map(|arc| arc.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| SnmpError::InvalidOid(oid.to_string()))
}

pub fn format_oid(arcs: &[u64]) -> String {
    arcs.iter()
        .map(|arc| arc.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// Whether `oid` lies strictly below `base` in the OID tree
pub fn is_descendant(oid: &[u64], base: &[u64]) -> bool {
    oid.len() > base.len() && oid.starts_with(base)
}
