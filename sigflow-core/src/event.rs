//! Event records and signals
//!
//! Record layout inside the queue and the scratch buffer:
//! ```text
//! ┌──────────────┬──────────────────────────────────┐
//! │ SIGNAL       │ PAYLOAD                          │
//! │ 2B (u16 LE)  │ item_size - 2 bytes, zero padded │
//! └──────────────┴──────────────────────────────────┘
//! ```
//!
//! The dispatcher only ever reads the signal. Payloads are opaque bytes
//! until a handler decodes them with [`Event::decode`].

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Size of the signal prefix in every record
pub const SIGNAL_SIZE: usize = 2;

/// Event signal identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Signal(pub u16);

impl Signal {
    /// No signal
    pub const NONE: Signal = Signal(0);
    /// Delivered directly to a handler when it becomes active
    pub const ENTRY: Signal = Signal(1);
    /// Delivered directly to a handler when it stops being active
    pub const EXIT: Signal = Signal(2);
    /// First application signal, also posted by `start(true)`
    pub const USER: Signal = Signal(3);

    pub const fn new(raw: u16) -> Self {
        Signal(raw)
    }

    /// Largest offset accepted by [`user`](Self::user)
    pub const MAX_USER_OFFSET: u16 = u16::MAX - Self::USER.0;

    /// Application signal `USER + offset`
    ///
    /// # Panics
    /// If `offset` exceeds [`MAX_USER_OFFSET`](Self::MAX_USER_OFFSET). In a
    /// `const` item this is a compile error.
    pub const fn user(offset: u16) -> Self {
        match Self::checked_user(offset) {
            Some(signal) => signal,
            None => panic!("user signal offset out of range"),
        }
    }

    /// Application signal `USER + offset`, `None` past the `u16` range
    pub const fn checked_user(offset: u16) -> Option<Self> {
        match Self::USER.0.checked_add(offset) {
            Some(raw) => Some(Signal(raw)),
            None => None,
        }
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// ENTRY and EXIT never travel through the queue
    pub fn is_synthetic(self) -> bool {
        matches!(self, Signal::ENTRY | Signal::EXIT)
    }

    /// Check if this signal is below the application range
    pub fn is_reserved(self) -> bool {
        self.0 < Self::USER.0
    }
}

/// A borrowed view of one event
///
/// Producers build it on the stack and post it; handlers receive one that
/// points into the dispatcher's scratch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event<'a> {
    signal: Signal,
    payload: &'a [u8],
}

impl<'a> Event<'a> {
    /// Event with no payload
    pub const fn new(signal: Signal) -> Self {
        Self {
            signal,
            payload: &[],
        }
    }

    /// Event carrying raw payload bytes
    pub const fn with_payload(signal: Signal, payload: &'a [u8]) -> Self {
        Self { signal, payload }
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Deserialize the payload with postcard
    ///
    /// Trailing record padding is ignored.
    pub fn decode<T: Deserialize<'a>>(&self) -> Result<T, Error> {
        postcard::from_bytes(self.payload).map_err(Error::from)
    }

    /// Total record size needed to carry this event
    pub fn record_len(&self) -> usize {
        SIGNAL_SIZE + self.payload.len()
    }

    /// Write this event into a record slot
    ///
    /// The slot must be at least [`record_len`](Self::record_len) bytes.
    /// Bytes past the payload are zeroed.
    pub(crate) fn write_record(&self, record: &mut [u8]) {
        let (sig, payload) = record.split_at_mut(SIGNAL_SIZE);
        sig.copy_from_slice(&self.signal.0.to_le_bytes());
        let (used, rest) = payload.split_at_mut(self.payload.len());
        used.copy_from_slice(self.payload);
        rest.fill(0);
    }

    /// View a record slot as an event
    ///
    /// Returns `None` when the slot cannot hold the signal prefix.
    pub(crate) fn read_record(record: &'a [u8]) -> Option<Self> {
        if record.len() < SIGNAL_SIZE {
            return None;
        }
        let (sig, payload) = record.split_at(SIGNAL_SIZE);
        Some(Self {
            signal: Signal(u16::from_le_bytes([sig[0], sig[1]])),
            payload,
        })
    }
}

/// Record size for a given payload capacity
pub const fn record_size(payload_capacity: usize) -> usize {
    SIGNAL_SIZE + payload_capacity
}

/// Owned event with a fixed-capacity payload
///
/// Used by producers that serialize a typed payload without allocating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBuf<const N: usize> {
    signal: Signal,
    payload: Vec<u8, N>,
}

impl<const N: usize> EventBuf<N> {
    /// Event with an empty payload
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            payload: Vec::new(),
        }
    }

    /// Serialize `value` as the payload
    pub fn encode<T: Serialize>(signal: Signal, value: &T) -> Result<Self, Error> {
        let mut buf = [0u8; N];
        let used = postcard::to_slice(value, &mut buf)?.len();

        let mut payload = Vec::new();
        payload
            .extend_from_slice(&buf[..used])
            .map_err(|_| Error::PayloadTooLarge)?;

        Ok(Self { signal, payload })
    }

    /// Copy raw bytes as the payload
    pub fn from_bytes(signal: Signal, bytes: &[u8]) -> Result<Self, Error> {
        let payload = Vec::from_slice(bytes).map_err(|_| Error::PayloadTooLarge)?;
        Ok(Self { signal, payload })
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn as_event(&self) -> Event<'_> {
        Event::with_payload(self.signal, &self.payload)
    }
}
