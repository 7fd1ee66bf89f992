//! Producer-side handles
//!
//! A [`Poster`] is a cheap `Copy` reference to a dispatcher's queue. It is
//! the only way producers reach a dispatcher, so nothing on the producer
//! side can touch the active handler.

use crate::config::PostTimeout;
use crate::error::Error;
use crate::event::Event;
use crate::queue::EventQueue;

/// Posts events into one dispatcher's queue
#[derive(Debug, Clone, Copy)]
pub struct Poster<'a> {
    queue: &'a EventQueue<'a>,
    timeout: PostTimeout,
}

impl<'a> Poster<'a> {
    /// Create a poster for `queue`
    ///
    /// The queue may still be unbound; posts then fail with
    /// [`Error::NotInitialized`] until the dispatcher is initialized.
    pub fn new(queue: &'a EventQueue<'a>, timeout: PostTimeout) -> Self {
        Self { queue, timeout }
    }

    pub fn timeout(&self) -> PostTimeout {
        self.timeout
    }

    /// Same queue, different wait policy
    pub fn with_timeout(self, timeout: PostTimeout) -> Self {
        Self { timeout, ..self }
    }

    /// Post from task context
    ///
    /// Waits for a free slot as configured by [`PostTimeout`]. Must not be
    /// called from an interrupt handler.
    pub async fn post(&self, event: &Event<'_>) -> Result<(), Error> {
        let signal = event.signal().raw();
        match self.queue.send(event, self.timeout).await {
            Ok(()) => {
                trace!("posted signal {}", signal);
                Ok(())
            }
            Err(e) => {
                let err = Error::from(e);
                warn!("post of signal {} failed: {:?}", signal, err);
                Err(err)
            }
        }
    }

    /// Post from task context without waiting
    pub fn try_post(&self, event: &Event<'_>) -> Result<(), Error> {
        let signal = event.signal().raw();
        match self.queue.try_send(event) {
            Ok(_) => {
                trace!("posted signal {}", signal);
                Ok(())
            }
            Err(e) => {
                let err = Error::from(e);
                warn!("post of signal {} failed: {:?}", signal, err);
                Err(err)
            }
        }
    }

    /// Post from interrupt context
    ///
    /// Never waits and never logs. `woken` is set when the post woke the
    /// parked consumer and is never cleared, so one flag can collect the
    /// result of several posts made by the same interrupt.
    pub fn post_from_isr(&self, event: &Event<'_>, woken: &mut bool) -> Result<(), Error> {
        let consumer_woken = self.queue.try_send(event).map_err(Error::from)?;
        *woken |= consumer_woken;
        Ok(())
    }

    /// Records currently waiting in the queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Signal, SIGNAL_SIZE};
    use embassy_futures::block_on;
    use embassy_time::Duration;

    const ITEM_SIZE: usize = 4;

    #[test]
    fn test_unbound_queue_is_not_initialized() {
        let queue = EventQueue::new();
        let poster = Poster::new(&queue, PostTimeout::default());
        let event = Event::new(Signal::USER);
        let mut woken = false;

        assert_eq!(block_on(poster.post(&event)), Err(Error::NotInitialized));
        assert_eq!(poster.try_post(&event), Err(Error::NotInitialized));
        assert_eq!(
            poster.post_from_isr(&event, &mut woken),
            Err(Error::NotInitialized)
        );
        assert!(!woken);
    }

    #[test]
    fn test_post_full_after_timeout() {
        let mut storage = [0u8; ITEM_SIZE * 2];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 2, &mut storage).unwrap();
        let poster = Poster::new(&queue, PostTimeout::After(Duration::from_millis(5)));
        let event = Event::new(Signal::USER);

        block_on(poster.post(&event)).unwrap();
        block_on(poster.post(&event)).unwrap();
        assert_eq!(block_on(poster.post(&event)), Err(Error::QueueFull));
        assert_eq!(poster.pending(), 2);
    }

    #[test]
    fn test_isr_post_same_validation() {
        let mut storage = [0u8; ITEM_SIZE];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 1, &mut storage).unwrap();
        let poster = Poster::new(&queue, PostTimeout::Immediate);
        let mut woken = false;

        let oversized = [0u8; ITEM_SIZE - SIGNAL_SIZE + 1];
        assert_eq!(
            poster.post_from_isr(&Event::with_payload(Signal::USER, &oversized), &mut woken),
            Err(Error::PayloadTooLarge)
        );

        poster
            .post_from_isr(&Event::new(Signal::USER), &mut woken)
            .unwrap();
        assert_eq!(
            poster.post_from_isr(&Event::new(Signal::USER), &mut woken),
            Err(Error::QueueFull)
        );
        // No consumer was parked
        assert!(!woken);
    }

    #[test]
    fn test_woken_flag_is_sticky() {
        let mut storage = [0u8; ITEM_SIZE * 2];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 2, &mut storage).unwrap();
        let poster = Poster::new(&queue, PostTimeout::Immediate);

        let mut woken = true;
        poster
            .post_from_isr(&Event::new(Signal::USER), &mut woken)
            .unwrap();
        assert!(woken);
    }

    #[test]
    fn test_with_timeout_keeps_queue() {
        let mut storage = [0u8; ITEM_SIZE];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 1, &mut storage).unwrap();
        let poster = Poster::new(&queue, PostTimeout::Forever).with_timeout(PostTimeout::Immediate);

        assert_eq!(poster.timeout(), PostTimeout::Immediate);
        poster.try_post(&Event::new(Signal::USER)).unwrap();
        assert_eq!(block_on(poster.post(&Event::new(Signal::USER))), Err(Error::QueueFull));
    }

    #[test]
    fn test_post_errors_follow_queue_error_mapping() {
        let event = Event::new(Signal::USER);
        let mut woken = false;

        let unbound = EventQueue::new();
        let poster = Poster::new(&unbound, PostTimeout::Immediate);
        let expected = Error::from(unbound.try_send(&event).unwrap_err());
        assert_eq!(poster.try_post(&event), Err(expected));
        assert_eq!(block_on(poster.post(&event)), Err(expected));
        assert_eq!(poster.post_from_isr(&event, &mut woken), Err(expected));

        let mut storage = [0u8; ITEM_SIZE];
        let full = EventQueue::new();
        full.bind(ITEM_SIZE, 1, &mut storage).unwrap();
        full.try_send(&event).unwrap();
        let poster = Poster::new(&full, PostTimeout::Immediate);
        let expected = Error::from(full.try_send(&event).unwrap_err());
        assert_eq!(expected, Error::QueueFull);
        assert_eq!(poster.try_post(&event), Err(expected));
        assert_eq!(block_on(poster.post(&event)), Err(expected));
        assert_eq!(poster.post_from_isr(&event, &mut woken), Err(expected));
    }
}
