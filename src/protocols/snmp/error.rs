//! Error types for SNMP operations

use std::fmt;

pub type SnmpResult<T> = Result<T, SnmpError>;

#[derive(Debug)]
pub enum SnmpError {
    /// No community/credentials were supplied for the target
    MissingCredentials(String),

    /// Only v2c sessions are supported
    UnsupportedVersion(String),

    /// Target address could not be parsed
    InvalidTarget(String),

    /// Malformed object identifier
    InvalidOid(String),

    /// Session could not be opened
    ConnectionFailed(String),

    /// No response within the request deadline
    Timeout,

    /// Request failed on the wire
    RequestFailed(String),

    /// Agent answered with a non-zero error-status
    AgentError { status: u32, index: u32 },

    /// Higher-level operation failed because of `source`
    Context {
        context: String,
        source: Box<SnmpError>,
    },
}

impl SnmpError {
    pub fn context(context: impl Into<String>, source: SnmpError) -> Self {
        SnmpError::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the error was caused by the caller's input rather than the device
    pub fn is_caller_error(&self) -> bool {
        match self {
            SnmpError::MissingCredentials(_)
            | SnmpError::UnsupportedVersion(_)
            | SnmpError::InvalidTarget(_)
            | SnmpError::InvalidOid(_) => true,
            SnmpError::Context { source, .. } => source.is_caller_error(),
            _ => false,
        }
    }
}

impl fmt::Display for SnmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpError::MissingCredentials(target) => {
                write!(f, "SNMP credentials not provided for {target}")
            }
            SnmpError::UnsupportedVersion(version) => {
                write!(f, "unsupported SNMP version '{version}' (only v2c is supported)")
            }
            SnmpError::InvalidTarget(msg) => write!(f, "invalid SNMP target: {msg}"),
            SnmpError::InvalidOid(oid) => write!(f, "invalid OID '{oid}'"),
            SnmpError::ConnectionFailed(msg) => write!(f, "failed to open SNMP session: {msg}"),
            SnmpError::Timeout => write!(f, "SNMP request timed out"),
            SnmpError::RequestFailed(msg) => write!(f, "SNMP request failed: {msg}"),
            SnmpError::AgentError { status, index } => {
                write!(f, "SNMP agent returned error-status {status} at index {index}")
            }
            SnmpError::Context { context, source } => write!(f, "{context}: {source}"),
        }
    }
}

impl std::error::Error for SnmpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnmpError::Context { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
