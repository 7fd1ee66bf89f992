//! Queue-fed flat state machine dispatcher
//!
//! A single consumer task drains a bounded event queue and hands every
//! event to the currently active state handler:
//!
//! - Event records: a `u16` signal prefix followed by a fixed-size payload
//! - Bounded queue over caller-supplied storage, safe to feed from interrupts
//! - State handler contract: event in, [`Status`] out
//! - Transition protocol: EXIT to the old handler, ENTRY to the new one
//!
//! # Layout
//!
//! ```text
//!  tasks ──post()──────────┐
//!                          ▼
//!  ISRs ──post_from_isr()─► EventQueue ──event_loop()──► active handler
//!                                                           │
//!                              EXIT / ENTRY ◄── Transition ─┘
//! ```
//!
//! Nothing in this crate allocates. Queue storage and the scratch buffer
//! are handed in by the application at [`Dispatcher::init`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("Features 'defmt' and 'log' cannot be enabled at the same time.");

// Must come first so the logging macros are visible in every module.
#[macro_use]
mod fmt;

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod poster;
pub mod queue;

pub use config::{DispatcherConfig, PostTimeout};
pub use dispatcher::Dispatcher;
pub use error::Error;
pub use event::{Event, EventBuf, Signal, SIGNAL_SIZE};
pub use handler::{Context, StateHandler, Status};
pub use poster::Poster;
pub use queue::{EventQueue, QueueError};
