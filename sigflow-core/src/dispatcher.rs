//! Dispatcher core
//!
//! Owns the consumer side of one queue: the scratch buffer every dequeued
//! record is copied into, the active state handler and the application
//! data handed to it. Exactly one task drives a dispatcher; producers use
//! [`Poster`] handles obtained from [`Dispatcher::poster`].
//!
//! Transition sequence, run before the next record is dequeued:
//! ```text
//! active(event) ──Transition(target)──► active(EXIT)
//!                                       active = target
//!                                       active(ENTRY)
//! ```

use core::fmt;

use crate::config::DispatcherConfig;
use crate::error::Error;
use crate::event::{Event, Signal, SIGNAL_SIZE};
use crate::handler::{Context, StateHandler, Status};
use crate::poster::Poster;
use crate::queue::{EventQueue, QueueError};

/// Single-consumer event dispatcher for a flat state machine
pub struct Dispatcher<'a, C> {
    queue: &'a EventQueue<'a>,
    /// Exactly `item_size` bytes, overwritten by every dequeue
    scratch: &'a mut [u8],
    active: StateHandler<C>,
    context: Context<'a, C>,
}

impl<C: fmt::Debug> fmt::Debug for Dispatcher<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queue", self.queue)
            .field("active", &(self.active as *const ()))
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl<'a, C> Dispatcher<'a, C> {
    /// Bind `queue` to its storage and make `default_handler` active
    ///
    /// `queue_storage` must hold `item_count` records of `item_size` bytes
    /// and `scratch` one record. Nothing is delivered to the handler until
    /// [`start`](Self::start).
    ///
    /// # Errors
    /// - [`Error::NullArgument`]: `queue_storage` or `scratch` is empty
    /// - [`Error::InvalidArgument`]: a size is zero, `item_size` cannot hold
    ///   the signal prefix, or `scratch` is shorter than `item_size`
    /// - [`Error::NotInitialized`]: the queue refused the storage or is
    ///   already bound
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        queue: &'a EventQueue<'a>,
        item_size: usize,
        item_count: usize,
        queue_storage: &'a mut [u8],
        scratch: &'a mut [u8],
        default_handler: StateHandler<C>,
        app: C,
        config: DispatcherConfig,
    ) -> Result<Self, Error> {
        if queue_storage.is_empty() || scratch.is_empty() {
            error!("dispatcher init: empty buffer");
            return Err(Error::NullArgument);
        }

        if item_size == 0 || item_count == 0 {
            error!(
                "dispatcher init: zero size (item_size={}, item_count={})",
                item_size, item_count
            );
            return Err(Error::InvalidArgument);
        }

        if item_size < SIGNAL_SIZE || scratch.len() < item_size {
            error!(
                "dispatcher init: item_size={} does not fit signal or scratch ({} bytes)",
                item_size,
                scratch.len()
            );
            return Err(Error::InvalidArgument);
        }

        if let Err(e) = queue.bind(item_size, item_count, queue_storage) {
            error!("dispatcher init: queue rejected storage: {:?}", e);
            return Err(Error::NotInitialized);
        }

        let (scratch, _) = scratch.split_at_mut(item_size);
        scratch.fill(0);

        info!(
            "dispatcher ready: {} records of {} bytes",
            item_count, item_size
        );

        Ok(Self {
            queue,
            scratch,
            active: default_handler,
            context: Context::new(app, Poster::new(queue, config.post_timeout)),
        })
    }

    /// Deliver ENTRY to the default handler, optionally queue USER
    ///
    /// ENTRY is a direct call. With `user_signal` a USER event is posted
    /// with the configured timeout and its result returned.
    pub async fn start(&mut self, user_signal: bool) -> Result<(), Error> {
        info!("dispatcher starting");
        self.deliver(Signal::ENTRY);

        if user_signal {
            self.context.poster().post(&Event::new(Signal::USER)).await
        } else {
            Ok(())
        }
    }

    /// Wait for one event and dispatch it
    ///
    /// Parks until a record arrives. Call in a loop from the consumer task.
    pub async fn event_loop(&mut self) -> Result<(), Error> {
        if let Err(e) = self.queue.receive(self.scratch).await {
            error!("dequeue failed: {:?}", e);
            return Err(Error::ProcessFailed);
        }
        self.dispatch_scratch()
    }

    /// Dispatch one queued event if there is one
    ///
    /// Returns [`Error::QueueEmpty`] instead of waiting.
    pub fn dispatch_pending(&mut self) -> Result<(), Error> {
        match self.queue.try_receive(self.scratch) {
            Ok(()) => self.dispatch_scratch(),
            Err(QueueError::Empty) => Err(Error::QueueEmpty),
            Err(e) => {
                error!("dequeue failed: {:?}", e);
                Err(Error::ProcessFailed)
            }
        }
    }

    /// Run the event loop forever
    ///
    /// Failed iterations are logged and the loop continues.
    pub async fn run(&mut self) {
        loop {
            if let Err(e) = self.event_loop().await {
                error!("event loop iteration failed: {:?}", e);
            }
        }
    }

    /// Hand the record in the scratch buffer to the active handler
    fn dispatch_scratch(&mut self) -> Result<(), Error> {
        let event = Event::read_record(self.scratch).ok_or(Error::ProcessFailed)?;
        debug!("dispatching signal {}", event.signal().raw());

        let status = (self.active)(&mut self.context, &event);
        if let Status::Transition(target) = status {
            self.transition(target);
        }
        Ok(())
    }

    fn transition(&mut self, target: StateHandler<C>) {
        self.deliver(Signal::EXIT);
        self.active = target;
        self.deliver(Signal::ENTRY);
        info!("state transition complete");
    }

    /// Direct call with a synthetic event, bypassing the queue
    fn deliver(&mut self, signal: Signal) {
        trace!("delivering synthetic signal {}", signal.raw());
        let status = (self.active)(&mut self.context, &Event::new(signal));
        if status.is_transition() {
            warn!(
                "transition requested on synthetic signal {}, ignored",
                signal.raw()
            );
        }
    }

    /// Currently active state handler
    pub fn active(&self) -> StateHandler<C> {
        self.active
    }

    /// Check whether `handler` is the active state
    pub fn is_active(&self, handler: StateHandler<C>) -> bool {
        core::ptr::fn_addr_eq(self.active, handler)
    }

    pub fn context(&self) -> &Context<'a, C> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context<'a, C> {
        &mut self.context
    }

    /// Producer handle using the configured post timeout
    pub fn poster(&self) -> Poster<'a> {
        self.context.poster()
    }

    /// Events waiting in the queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn item_size(&self) -> usize {
        self.scratch.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}
