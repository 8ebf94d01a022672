//! Error types for nearby-core.
//!
//! This module defines the errors that can occur while talking to the radio
//! layer or configuring the proximity engine.
//!
//! # How the coordinator treats errors
//!
//! The scan coordinator never surfaces per-device radio errors to the caller.
//! A failed connect, a missing characteristic, or a malformed identity payload
//! all end the same way: the peripheral is disconnected and the device stays
//! unidentified until a later connect cycle retries it.
//!
//! | Error Type | Coordinator reaction |
//! |------------|----------------------|
//! | [`Error::ConnectionFailed`] | Disconnect, retry next cycle |
//! | [`Error::CharacteristicNotFound`] | Disconnect, retry next cycle |
//! | [`Error::InvalidPayload`] | Disconnect, retry next cycle |
//! | [`Error::Timeout`] | Disconnect, retry next cycle |
//! | [`Error::Bluetooth`] | Logged; scan restarts on the next rescan |
//! | [`Error::InvalidConfig`] | Returned from `start()`, nothing is armed |
//! | [`Error::DeviceNotFound`] | Returned when no adapter exists |

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in the proximity engine and its radio backends.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Device or adapter not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Operation attempted on a peripheral that is not connected.
    #[error("Not connected to device")]
    NotConnected,

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// Identity payload could not be parsed.
    #[error("Invalid identity payload: {0}")]
    InvalidPayload(#[from] nearby_types::ParseError),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Connection failed with specific reason.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// The transport id that failed to connect.
        device_id: Option<String>,
        /// The structured reason for the failure.
        reason: ConnectionFailureReason,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Structured reasons for connection failures.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionFailureReason {
    /// The peripheral is no longer known to the adapter.
    UnknownPeripheral,
    /// Device rejected the connection.
    Rejected,
    /// Connection attempt timed out.
    Timeout,
    /// Generic BLE error.
    BleError(String),
}

impl std::fmt::Display for ConnectionFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownPeripheral => write!(f, "peripheral unknown to adapter"),
            Self::Rejected => write!(f, "connection rejected by device"),
            Self::Timeout => write!(f, "connection timed out"),
            Self::BleError(msg) => write!(f, "BLE error: {}", msg),
        }
    }
}

/// Reason why a device was not found.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// No Bluetooth adapter available.
    NoAdapter,
    /// Peripheral with the given transport id is unknown.
    NotFound { identifier: String },
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a connection failure with structured reason.
    pub fn connection_failed(device_id: Option<String>, reason: ConnectionFailureReason) -> Self {
        Self::ConnectionFailed { device_id, reason }
    }
}

/// Result type alias using nearby-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use nearby_types::ParseError;

    #[test]
    fn test_error_display() {
        let err = Error::device_not_found("AA:BB:CC:DD:EE:FF");
        assert!(err.to_string().contains("AA:BB:CC:DD:EE:FF"));

        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "Not connected to device");

        let err = Error::characteristic_not_found("6e1f0c2b", 3);
        assert!(err.to_string().contains("6e1f0c2b"));
        assert!(err.to_string().contains("3 services"));

        let err = Error::timeout("read_identity", Duration::from_secs(5));
        assert!(err.to_string().contains("read_identity"));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: Error = ParseError::FieldCount(1).into();
        assert!(matches!(err, Error::InvalidPayload(_)));
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn test_connection_failed_display() {
        let err = Error::connection_failed(Some("peer".into()), ConnectionFailureReason::Timeout);
        assert_eq!(err.to_string(), "Connection failed: connection timed out");

        let err = Error::connection_failed(
            None,
            ConnectionFailureReason::BleError("le-connection-abort-by-local".into()),
        );
        assert!(err.to_string().contains("le-connection-abort-by-local"));
    }

    #[test]
    fn test_no_adapter_display() {
        let err = Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter);
        assert!(err.to_string().contains("no Bluetooth adapter"));
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
