use std::time::Duration;

/// Ошибки обмена с SNMP-агентом.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid OID '{oid}': {reason}")]
    InvalidOid { oid: String, reason: String },

    #[error("could not open SNMP session to {target}: {source}")]
    Session {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SNMP {operation} request for {oid} failed: {reason}")]
    Request {
        operation: &'static str,
        oid: String,
        reason: String,
    },

    #[error("SNMP {operation} for {oid} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        oid: String,
        timeout: Duration,
    },

    #[error("unsupported SNMP method '{0}'")]
    UnsupportedMethod(String),
}
