//! sigflow demo
//!
//! Runs the ping-pong machine on the host. The dispatcher, a ticker task
//! and a simulated button interrupt share one statically allocated queue.
//!
//! Usage: `sigflow-demo [config.toml]`

use std::path::PathBuf;
use std::process::ExitCode;

use embassy_futures::block_on;
use embassy_futures::select::select;
use log::{error, info, warn};
use sigflow_core::{Dispatcher, EventQueue};
use static_cell::StaticCell;

use crate::config::{DemoConfig, MAX_QUEUE_DEPTH};
use crate::states::{Machine, ITEM_SIZE};
use crate::tasks::ButtonIsr;

mod config;
mod states;
mod tasks;

/// Queue shared by the dispatcher and every producer
static QUEUE: EventQueue<'static> = EventQueue::new();

// Backing memory must outlive every poster handle
static QUEUE_STORAGE: StaticCell<[u8; ITEM_SIZE * MAX_QUEUE_DEPTH]> = StaticCell::new();
static SCRATCH: StaticCell<[u8; ITEM_SIZE]> = StaticCell::new();

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match DemoConfig::load(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!("{config:?}");

    let storage = QUEUE_STORAGE.init([0; ITEM_SIZE * MAX_QUEUE_DEPTH]);
    let Some(storage) = storage.get_mut(..ITEM_SIZE * config.queue_depth) else {
        error!("queue depth {} exceeds static storage", config.queue_depth);
        return ExitCode::FAILURE;
    };
    let scratch = SCRATCH.init([0; ITEM_SIZE]);

    let mut dispatcher = match Dispatcher::init(
        &QUEUE,
        ITEM_SIZE,
        config.queue_depth,
        storage,
        scratch,
        states::ping,
        Machine::new(config.transitions),
        config.dispatcher(),
    ) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!("dispatcher init failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Queue INIT and USER before any producer competes for slots
    if let Err(e) = block_on(dispatcher.start(true)) {
        error!("demo failed: {e}");
        return ExitCode::FAILURE;
    }

    let poster = dispatcher.poster();
    let isr = ButtonIsr::spawn(poster, config.isr_period(), config.isr_burst);

    block_on(select(
        consume(&mut dispatcher),
        tasks::tick_task(poster, config.tick_period()),
    ));

    let stats = isr.stop();

    let machine = dispatcher.context().app();
    info!(
        "done: {} transitions, {} readings, {} ticks, {} buttons, {} ignored",
        machine.transitions, machine.readings, machine.ticks, machine.buttons, machine.ignored
    );
    info!(
        "button isr: {} posted, {} dropped, {} wakeups, {} left in queue",
        stats.posted.load(std::sync::atomic::Ordering::Relaxed),
        stats.dropped.load(std::sync::atomic::Ordering::Relaxed),
        stats.wakeups.load(std::sync::atomic::Ordering::Relaxed),
        dispatcher.pending()
    );

    ExitCode::SUCCESS
}

/// Drive the dispatcher until the machine reaches its transition limit
async fn consume(dispatcher: &mut Dispatcher<'static, Machine>) {
    while !dispatcher.context().is_done() {
        if let Err(e) = dispatcher.event_loop().await {
            warn!("event dropped: {e}");
        }
    }
}
