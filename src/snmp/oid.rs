use snmp2::Oid;

use super::QueryError;

/// Разбирает OID вида `1.3.6.1.2.1.1.1.0` (ведущая точка допустима).
pub fn parse_oid(s: &str) -> Result<Oid<'static>, QueryError> {
    let invalid = |reason: String| QueryError::InvalidOid {
        oid: s.to_string(),
        reason,
    };

    let parts: Vec<u64> = s
        .trim()
        .split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| invalid(e.to_string()))?;

    if parts.is_empty() {
        return Err(invalid("no components".to_string()));
    }

    Oid::from(&parts).map_err(|e| invalid(format!("{:?}", e)))
}
