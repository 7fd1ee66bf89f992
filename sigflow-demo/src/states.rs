//! Ping-pong state machine
//!
//! Two states hand control back and forth. Each one, on entry, runs a short
//! chain of self-posted events, then waits for the ticker before switching
//! to the other:
//! ```text
//! ENTRY ──► INIT ──► EVENT_ONE(reading) ──► TICK ──► EVENT_TWO ──► Transition
//! ```
//! BUTTON arrives from the simulated interrupt and is only counted.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sigflow_core::event::record_size;
use sigflow_core::{Context, Event, EventBuf, Signal, StateHandler, Status};

/// Kicks off the chain in a freshly entered state
pub const INIT: Signal = Signal::user(1);
/// Carries a [`Reading`]
pub const EVENT_ONE: Signal = Signal::user(2);
/// Posted by the first TICK after a reading, ends the chain
pub const EVENT_TWO: Signal = Signal::user(3);
/// Posted by the ticker task
pub const TICK: Signal = Signal::user(4);
/// Posted by the simulated interrupt
pub const BUTTON: Signal = Signal::user(5);

/// Room for the largest postcard-encoded payload
pub const PAYLOAD_CAPACITY: usize = 12;

/// Queue record size
pub const ITEM_SIZE: usize = record_size(PAYLOAD_CAPACITY);

/// Payload of [`EVENT_ONE`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub param1: i32,
    pub param2: f32,
}

/// Application data shared by both states
#[derive(Debug, Default)]
pub struct Machine {
    /// Stop once this many transitions have happened
    pub limit: u32,
    pub transitions: u32,
    pub readings: u32,
    pub ticks: u32,
    pub buttons: u32,
    pub ignored: u32,
    /// A reading arrived, the next TICK moves on
    pub armed: bool,
}

impl Machine {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn is_done(&self) -> bool {
        self.transitions >= self.limit
    }
}

pub fn ping(ctx: &mut Context<'_, Machine>, event: &Event<'_>) -> Status<Machine> {
    handle("ping", pong, ctx, event)
}

pub fn pong(ctx: &mut Context<'_, Machine>, event: &Event<'_>) -> Status<Machine> {
    handle("pong", ping, ctx, event)
}

/// Shared body of both states, `next` is where EVENT_TWO leads
fn handle(
    name: &str,
    next: StateHandler<Machine>,
    ctx: &mut Context<'_, Machine>,
    event: &Event<'_>,
) -> Status<Machine> {
    match event.signal() {
        Signal::ENTRY => {
            info!("{name}: entry");
            ctx.armed = false;
            post_or_unhandled(ctx, &Event::new(INIT))
        }
        Signal::EXIT => {
            info!("{name}: exit");
            Status::Handled
        }
        Signal::USER => {
            info!("{name}: started");
            Status::Handled
        }
        INIT => {
            let reading = Reading {
                param1: 1000 + ctx.readings as i32,
                param2: ctx.readings as f32 * 0.25,
            };
            match EventBuf::<PAYLOAD_CAPACITY>::encode(EVENT_ONE, &reading) {
                Ok(buf) => post_or_unhandled(ctx, &buf.as_event()),
                Err(e) => {
                    warn!("{name}: cannot encode reading: {e}");
                    Status::Unhandled
                }
            }
        }
        EVENT_ONE => match event.decode::<Reading>() {
            Ok(reading) => {
                ctx.readings += 1;
                ctx.armed = true;
                info!(
                    "{name}: param1={} param2={:.2}",
                    reading.param1, reading.param2
                );
                Status::Handled
            }
            Err(e) => {
                warn!("{name}: bad reading payload: {e}");
                Status::Unhandled
            }
        },
        EVENT_TWO => {
            ctx.transitions += 1;
            Status::Transition(next)
        }
        TICK => {
            ctx.ticks += 1;
            debug!("{name}: tick {}", ctx.ticks);
            // Stays armed if the post fails, so the next tick retries
            if ctx.armed && ctx.post(&Event::new(EVENT_TWO)).is_ok() {
                ctx.armed = false;
            }
            Status::Handled
        }
        BUTTON => {
            ctx.buttons += 1;
            Status::Handled
        }
        other => {
            warn!("{name}: unknown signal {}", other.raw());
            ctx.ignored += 1;
            Status::Ignored
        }
    }
}

fn post_or_unhandled(ctx: &Context<'_, Machine>, event: &Event<'_>) -> Status<Machine> {
    match ctx.post(event) {
        Ok(()) => Status::Handled,
        Err(_) => Status::Unhandled,
    }
}
