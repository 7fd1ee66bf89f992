//! Dispatcher error taxonomy

use core::fmt;

use crate::queue::QueueError;

/// Errors returned by dispatcher and posting operations
///
/// Every failure is returned to the caller. The core never retries and
/// never panics; retry policy and escalation belong to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A required buffer was absent (empty)
    NullArgument,
    /// A size parameter was zero or inconsistent
    InvalidArgument,
    /// The queue is unbound or refused its backing storage
    NotInitialized,
    /// The post timeout elapsed while the queue stayed full
    QueueFull,
    /// No event was queued (non-blocking dispatch only)
    QueueEmpty,
    /// Queue-level failure not covered by the other kinds
    ProcessFailed,
    /// Payload does not fit the record's payload area
    PayloadTooLarge,
    /// Payload could not be serialized or deserialized
    Codec,
}

impl Error {
    /// Backpressure errors the caller may retry later
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Error::QueueFull)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::NullArgument => "required buffer is empty",
            Error::InvalidArgument => "invalid size argument",
            Error::NotInitialized => "dispatcher queue is not initialized",
            Error::QueueFull => "event queue is full",
            Error::QueueEmpty => "event queue is empty",
            Error::ProcessFailed => "event processing failed",
            Error::PayloadTooLarge => "payload exceeds record size",
            Error::Codec => "payload codec failure",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for Error {}

impl From<QueueError> for Error {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Unbound | QueueError::AlreadyBound | QueueError::StorageTooSmall => {
                Error::NotInitialized
            }
            QueueError::InvalidSize => Error::InvalidArgument,
            QueueError::Full => Error::QueueFull,
            QueueError::Empty => Error::QueueEmpty,
            QueueError::RecordTooLarge => Error::PayloadTooLarge,
        }
    }
}

impl From<postcard::Error> for Error {
    fn from(err: postcard::Error) -> Self {
        match err {
            postcard::Error::SerializeBufferFull => Error::PayloadTooLarge,
            _ => Error::Codec,
        }
    }
}
