//! Maps driver failures into a closed error taxonomy.
//!
//! Two independent lookups run for every error: one picks the [`ErrorKind`]
//! (server error number first, then network code, then a generic fallback),
//! the other decides whether the failure is transient. A matched kind says
//! nothing about transience and vice versa.

use crate::error::DatabaseError;
use serde::Serialize;
use std::fmt;
use std::io;

/// Network-level failure codes understood by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NetworkCode {
    #[serde(rename = "ECONNREFUSED")]
    ConnectionRefused,
    #[serde(rename = "ETIMEDOUT")]
    TimedOut,
    #[serde(rename = "ENOTFOUND")]
    HostNotFound,
    #[serde(rename = "ENETUNREACH")]
    NetworkUnreachable,
    #[serde(rename = "ECONNRESET")]
    ConnectionReset,
    #[serde(rename = "EPIPE")]
    BrokenPipe,
}

impl NetworkCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "ECONNREFUSED",
            Self::TimedOut => "ETIMEDOUT",
            Self::HostNotFound => "ENOTFOUND",
            Self::NetworkUnreachable => "ENETUNREACH",
            Self::ConnectionReset => "ECONNRESET",
            Self::BrokenPipe => "EPIPE",
        }
    }

    /// Derive a network code from an I/O error kind and its message.
    ///
    /// Name resolution failures surface as uncategorized I/O errors, so they
    /// are recognised by message.
    pub fn from_io(kind: io::ErrorKind, message: &str) -> Option<Self> {
        match kind {
            io::ErrorKind::ConnectionRefused => Some(Self::ConnectionRefused),
            io::ErrorKind::TimedOut => Some(Self::TimedOut),
            io::ErrorKind::NetworkUnreachable => Some(Self::NetworkUnreachable),
            io::ErrorKind::ConnectionReset => Some(Self::ConnectionReset),
            io::ErrorKind::BrokenPipe => Some(Self::BrokenPipe),
            _ if is_lookup_failure(message) => Some(Self::HostNotFound),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_lookup_failure(message: &str) -> bool {
    const MARKERS: [&str; 4] = [
        "failed to lookup address",
        "name or service not known",
        "no such host is known",
        "nodename nor servname",
    ];
    let message = message.to_lowercase();
    MARKERS.iter().any(|marker| message.contains(marker))
}

/// Closed set of failure categories reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    AuthenticationFailed,
    DatabaseNotFound,
    ObjectNotFound,
    PermissionDenied,
    QueryTimeout,
    ConnectionTimeout,
    ConstraintViolation,
    DuplicateKey,
    ArithmeticOverflow,
    Truncation,
    InvalidObjectName,
    InvalidColumnName,
    SyntaxError,
    ConnectionRefused,
    ConnectionTimedOut,
    HostNotFound,
    NetworkUnreachable,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication-failed",
            Self::DatabaseNotFound => "database-not-found",
            Self::ObjectNotFound => "object-not-found",
            Self::PermissionDenied => "permission-denied",
            Self::QueryTimeout => "query-timeout",
            Self::ConnectionTimeout => "connection-timeout",
            Self::ConstraintViolation => "constraint-violation",
            Self::DuplicateKey => "duplicate-key",
            Self::ArithmeticOverflow => "arithmetic-overflow",
            Self::Truncation => "truncation",
            Self::InvalidObjectName => "invalid-object-name",
            Self::InvalidColumnName => "invalid-column-name",
            Self::SyntaxError => "syntax-error",
            Self::ConnectionRefused => "connection-refused",
            Self::ConnectionTimedOut => "connection-timed-out",
            Self::HostNotFound => "host-not-found",
            Self::NetworkUnreachable => "network-unreachable",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The code a classified error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OriginalCode {
    Number(i32),
    Network(NetworkCode),
}

impl fmt::Display for OriginalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Network(code) => f.write_str(code.as_str()),
        }
    }
}

/// Result of [`classify`]. Only the classifier can build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    kind: ErrorKind,
    transient: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_code: Option<OriginalCode>,
}

impl ClassifiedError {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether retrying with the same parameters may succeed.
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn original_code(&self) -> Option<OriginalCode> {
        self.original_code
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [kind={}", self.message, self.kind)?;
        if let Some(code) = &self.original_code {
            write!(f, ", code={}", code)?;
        }
        write!(f, ", transient={}]", self.transient)
    }
}

impl std::error::Error for ClassifiedError {}

/// Server error numbers that are worth retrying.
const TRANSIENT_NUMBERS: [i32; 10] = [
    -2,    // timeout
    701,   // out of memory
    921,   // database not yet recovered
    1204,  // lock resources exhausted
    1205,  // deadlock victim
    1221,  // resource lock validation
    40143, // Azure SQL connection issue
    40197, // Azure SQL error processing request
    40501, // Azure SQL service busy
    40613, // Azure SQL database unavailable
];

const TRANSIENT_NETWORK: [NetworkCode; 3] = [
    NetworkCode::TimedOut,
    NetworkCode::ConnectionReset,
    NetworkCode::BrokenPipe,
];

fn kind_for_number(number: i32) -> Option<(ErrorKind, &'static str)> {
    let matched = match number {
        18456 => (ErrorKind::AuthenticationFailed, "Authentication failed"),
        4060 => (ErrorKind::DatabaseNotFound, "Database does not exist"),
        208 => (ErrorKind::ObjectNotFound, "Object does not exist"),
        229 | 230 => (ErrorKind::PermissionDenied, "Insufficient permissions"),
        -2 => (ErrorKind::QueryTimeout, "Query execution timeout"),
        -1 => (ErrorKind::ConnectionTimeout, "Connection timeout"),
        547 => (
            ErrorKind::ConstraintViolation,
            "Operation would violate database constraints",
        ),
        2601 | 2627 => (ErrorKind::DuplicateKey, "Duplicate key value"),
        8115 => (ErrorKind::ArithmeticOverflow, "Arithmetic overflow error"),
        8152 => (ErrorKind::Truncation, "Data would be truncated"),
        201 => (ErrorKind::InvalidObjectName, "Invalid object name"),
        207 => (ErrorKind::InvalidColumnName, "Invalid column name"),
        102 => (ErrorKind::SyntaxError, "SQL syntax error"),
        _ => return None,
    };
    Some(matched)
}

fn kind_for_network(code: NetworkCode) -> Option<(ErrorKind, &'static str)> {
    let matched = match code {
        NetworkCode::ConnectionRefused => (ErrorKind::ConnectionRefused, "Connection refused"),
        NetworkCode::TimedOut => (ErrorKind::ConnectionTimedOut, "Connection timed out"),
        NetworkCode::HostNotFound => (ErrorKind::HostNotFound, "Host not found"),
        NetworkCode::NetworkUnreachable => {
            (ErrorKind::NetworkUnreachable, "Network unreachable")
        }
        NetworkCode::ConnectionReset | NetworkCode::BrokenPipe => return None,
    };
    Some(matched)
}

/// Whether a driver error is worth retrying, independent of its kind.
pub fn is_transient(error: &DatabaseError) -> bool {
    error
        .number
        .is_some_and(|number| TRANSIENT_NUMBERS.contains(&number))
        || error
            .network
            .is_some_and(|code| TRANSIENT_NETWORK.contains(&code))
}

/// Classify a driver error. Total: every input yields a result.
pub fn classify(error: &DatabaseError) -> ClassifiedError {
    let matched = error
        .number
        .and_then(kind_for_number)
        .or_else(|| error.network.and_then(kind_for_network));

    let (kind, message) = match matched {
        Some((kind, message)) => (kind, message.to_string()),
        None if error.message.is_empty() => {
            (ErrorKind::Unknown, "An unknown error occurred".to_string())
        }
        None => (ErrorKind::Unknown, error.message.clone()),
    };

    let original_code = error
        .number
        .map(OriginalCode::Number)
        .or(error.network.map(OriginalCode::Network));

    ClassifiedError {
        kind,
        transient: is_transient(error),
        message,
        original_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_table() {
        let cases = [
            (18456, ErrorKind::AuthenticationFailed),
            (4060, ErrorKind::DatabaseNotFound),
            (208, ErrorKind::ObjectNotFound),
            (229, ErrorKind::PermissionDenied),
            (230, ErrorKind::PermissionDenied),
            (-2, ErrorKind::QueryTimeout),
            (-1, ErrorKind::ConnectionTimeout),
            (547, ErrorKind::ConstraintViolation),
            (2601, ErrorKind::DuplicateKey),
            (2627, ErrorKind::DuplicateKey),
            (8115, ErrorKind::ArithmeticOverflow),
            (8152, ErrorKind::Truncation),
            (201, ErrorKind::InvalidObjectName),
            (207, ErrorKind::InvalidColumnName),
            (102, ErrorKind::SyntaxError),
        ];

        for (number, kind) in cases {
            let classified = classify(&DatabaseError::server(number, "raw driver text"));
            assert_eq!(classified.kind(), kind, "number {}", number);
            assert_ne!(classified.message(), "raw driver text");
            assert_eq!(classified.original_code(), Some(OriginalCode::Number(number)));
        }
    }

    #[test]
    fn test_login_failure_hides_driver_text() {
        let classified = classify(&DatabaseError::server(
            18456,
            "Login failed for user 'sa'.",
        ));
        assert_eq!(classified.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(classified.message(), "Authentication failed");
        assert!(!classified.is_transient());
    }

    #[test]
    fn test_network_table() {
        let cases = [
            (NetworkCode::ConnectionRefused, ErrorKind::ConnectionRefused),
            (NetworkCode::TimedOut, ErrorKind::ConnectionTimedOut),
            (NetworkCode::HostNotFound, ErrorKind::HostNotFound),
            (NetworkCode::NetworkUnreachable, ErrorKind::NetworkUnreachable),
        ];

        for (code, kind) in cases {
            let classified = classify(&DatabaseError::network(code, "socket text"));
            assert_eq!(classified.kind(), kind);
            assert_eq!(classified.original_code(), Some(OriginalCode::Network(code)));
        }
    }

    #[test]
    fn test_unmatched_number_falls_through_to_network() {
        let error = DatabaseError {
            number: Some(99999),
            network: Some(NetworkCode::HostNotFound),
            message: "odd".into(),
        };
        assert_eq!(classify(&error).kind(), ErrorKind::HostNotFound);
    }

    #[test]
    fn test_unknown_keeps_raw_message() {
        let classified = classify(&DatabaseError::other("Something strange happened"));
        assert_eq!(classified.kind(), ErrorKind::Unknown);
        assert_eq!(classified.message(), "Something strange happened");
        assert!(!classified.is_transient());
        assert!(classified.original_code().is_none());

        let classified = classify(&DatabaseError::other(""));
        assert_eq!(classified.kind(), ErrorKind::Unknown);
        assert_eq!(classified.message(), "An unknown error occurred");
    }

    #[test]
    fn test_unmatched_codes_are_unknown() {
        let classified = classify(&DatabaseError::server(50000, "user raised"));
        assert_eq!(classified.kind(), ErrorKind::Unknown);
        assert_eq!(classified.message(), "user raised");

        let classified = classify(&DatabaseError::network(NetworkCode::ConnectionReset, "reset"));
        assert_eq!(classified.kind(), ErrorKind::Unknown);
        assert!(classified.is_transient());
    }

    #[test]
    fn test_transience_is_independent_of_kind() {
        assert!(classify(&DatabaseError::server(1204, "lock")).is_transient());
        assert!(classify(&DatabaseError::server(1205, "deadlock")).is_transient());
        assert!(!classify(&DatabaseError::server(547, "fk")).is_transient());

        // Matched kind, permanent.
        assert!(!classify(&DatabaseError::server(-1, "connect timeout")).is_transient());
        // Matched kind, transient.
        assert!(classify(&DatabaseError::server(-2, "query timeout")).is_transient());
        // Unknown kind, transient.
        let classified = classify(&DatabaseError::server(40613, "unavailable"));
        assert_eq!(classified.kind(), ErrorKind::Unknown);
        assert!(classified.is_transient());

        assert!(classify(&DatabaseError::network(NetworkCode::TimedOut, "t")).is_transient());
        assert!(classify(&DatabaseError::network(NetworkCode::BrokenPipe, "p")).is_transient());
        assert!(
            !classify(&DatabaseError::network(NetworkCode::ConnectionRefused, "r")).is_transient()
        );
    }

    #[test]
    fn test_transient_numbers() {
        for number in [-2, 701, 921, 1204, 1205, 1221, 40143, 40197, 40501, 40613] {
            assert!(is_transient(&DatabaseError::server(number, "")), "{}", number);
        }
        assert!(!is_transient(&DatabaseError::server(18456, "")));
    }

    #[test]
    fn test_display_carries_debug_details() {
        let classified = classify(&DatabaseError::server(1205, "deadlocked"));
        assert_eq!(
            classified.to_string(),
            "deadlocked [kind=unknown, code=1205, transient=true]"
        );

        let classified = classify(&DatabaseError::network(NetworkCode::ConnectionRefused, "x"));
        assert_eq!(
            classified.to_string(),
            "Connection refused [kind=connection-refused, code=ECONNREFUSED, transient=false]"
        );
    }

    #[test]
    fn test_network_code_from_io() {
        assert_eq!(
            NetworkCode::from_io(io::ErrorKind::ConnectionRefused, ""),
            Some(NetworkCode::ConnectionRefused)
        );
        assert_eq!(
            NetworkCode::from_io(io::ErrorKind::BrokenPipe, ""),
            Some(NetworkCode::BrokenPipe)
        );
        assert_eq!(
            NetworkCode::from_io(
                io::ErrorKind::Other,
                "failed to lookup address information: Name or service not known"
            ),
            Some(NetworkCode::HostNotFound)
        );
        assert_eq!(NetworkCode::from_io(io::ErrorKind::Other, "whatever"), None);
    }

    #[test]
    fn test_serialized_shape() {
        let classified = classify(&DatabaseError::network(NetworkCode::HostNotFound, "dns"));
        let json = serde_json::to_value(&classified).unwrap();
        assert_eq!(json["kind"], "host-not-found");
        assert_eq!(json["transient"], false);
        assert_eq!(json["originalCode"], "ENOTFOUND");
    }
}
