//! Bounded event queue over caller-supplied storage
//!
//! A FIFO of fixed-size byte records. The queue object is `const`
//! constructible so it can live in a `static` that interrupt handlers
//! reach; the backing storage is attached once with [`EventQueue::bind`].
//!
//! All state sits behind a critical-section mutex, which makes every
//! operation safe from both task and interrupt context. Waiting is done
//! with waker registration, the same way `embassy_sync::channel::Channel`
//! parks senders and receivers.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::WakerRegistration;
use embassy_time::with_timeout;

use crate::config::PostTimeout;
use crate::event::{Event, SIGNAL_SIZE};

/// Queue collaborator errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// No storage has been bound yet
    Unbound,
    /// Storage was already bound
    AlreadyBound,
    /// Record size or count is zero, or a buffer is shorter than a record
    InvalidSize,
    /// Storage cannot hold `item_count` records
    StorageTooSmall,
    /// Event does not fit in one record
    RecordTooLarge,
    /// No free slot
    Full,
    /// Nothing to receive
    Empty,
}

impl core::fmt::Display for QueueError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            QueueError::Unbound => "queue has no storage",
            QueueError::AlreadyBound => "queue storage already bound",
            QueueError::InvalidSize => "invalid record size or count",
            QueueError::StorageTooSmall => "queue storage too small",
            QueueError::RecordTooLarge => "event larger than record",
            QueueError::Full => "queue full",
            QueueError::Empty => "queue empty",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for QueueError {}

/// Ring buffer state
struct Ring<'a> {
    storage: Option<&'a mut [u8]>,
    item_size: usize,
    capacity: usize,
    /// Slot index of the oldest record
    head: usize,
    len: usize,
    receiver_waker: WakerRegistration,
    senders_waker: WakerRegistration,
}

impl<'a> Ring<'a> {
    const fn new() -> Self {
        Self {
            storage: None,
            item_size: 0,
            capacity: 0,
            head: 0,
            len: 0,
            receiver_waker: WakerRegistration::new(),
            senders_waker: WakerRegistration::new(),
        }
    }

    /// Push one record
    ///
    /// Returns whether a parked receiver was woken.
    fn try_push(&mut self, event: &Event<'_>) -> Result<bool, QueueError> {
        let item_size = self.item_size;
        let storage = self.storage.as_deref_mut().ok_or(QueueError::Unbound)?;

        if event.record_len() > item_size {
            return Err(QueueError::RecordTooLarge);
        }
        if self.len == self.capacity {
            return Err(QueueError::Full);
        }

        let slot = (self.head + self.len) % self.capacity;
        let offset = slot * item_size;
        event.write_record(&mut storage[offset..offset + item_size]);
        self.len += 1;

        let woken = self.receiver_waker.occupied();
        self.receiver_waker.wake();
        Ok(woken)
    }

    /// Pop the oldest record into `out`
    fn try_pop(&mut self, out: &mut [u8]) -> Result<(), QueueError> {
        let item_size = self.item_size;
        let storage = self.storage.as_deref().ok_or(QueueError::Unbound)?;

        if out.len() < item_size {
            return Err(QueueError::InvalidSize);
        }
        if self.len == 0 {
            return Err(QueueError::Empty);
        }

        let offset = self.head * item_size;
        out[..item_size].copy_from_slice(&storage[offset..offset + item_size]);
        self.head = (self.head + 1) % self.capacity;
        self.len -= 1;

        self.senders_waker.wake();
        Ok(())
    }
}

/// Bounded multi-producer, single-consumer record queue
pub struct EventQueue<'a> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Ring<'a>>>,
}

impl core::fmt::Debug for EventQueue<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.with(|ring| {
            f.debug_struct("EventQueue")
                .field("bound", &ring.storage.is_some())
                .field("item_size", &ring.item_size)
                .field("capacity", &ring.capacity)
                .field("len", &ring.len)
                .finish()
        })
    }
}

impl Default for EventQueue<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> EventQueue<'a> {
    /// Create an unbound queue
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Ring::new())),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Ring<'a>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Attach backing storage for `item_count` records of `item_size` bytes
    ///
    /// Only the first `item_size * item_count` bytes of `storage` are used.
    /// A queue can be bound once.
    pub fn bind(
        &self,
        item_size: usize,
        item_count: usize,
        storage: &'a mut [u8],
    ) -> Result<(), QueueError> {
        if item_size < SIGNAL_SIZE || item_count == 0 {
            return Err(QueueError::InvalidSize);
        }
        let required = item_size
            .checked_mul(item_count)
            .ok_or(QueueError::InvalidSize)?;
        if storage.len() < required {
            return Err(QueueError::StorageTooSmall);
        }

        let (used, _) = storage.split_at_mut(required);
        self.with(move |ring| {
            if ring.storage.is_some() {
                return Err(QueueError::AlreadyBound);
            }
            used.fill(0);
            ring.storage = Some(used);
            ring.item_size = item_size;
            ring.capacity = item_count;
            ring.head = 0;
            ring.len = 0;
            Ok(())
        })
    }

    pub fn is_bound(&self) -> bool {
        self.with(|ring| ring.storage.is_some())
    }

    /// Record size in bytes, 0 while unbound
    pub fn item_size(&self) -> usize {
        self.with(|ring| ring.item_size)
    }

    /// Maximum number of queued records, 0 while unbound
    pub fn capacity(&self) -> usize {
        self.with(|ring| ring.capacity)
    }

    /// Records currently queued
    pub fn len(&self) -> usize {
        self.with(|ring| ring.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.with(|ring| ring.storage.is_some() && ring.len == ring.capacity)
    }

    /// Non-blocking enqueue, safe from interrupt context
    ///
    /// Returns `Ok(true)` when the enqueue woke a parked receiver.
    pub fn try_send(&self, event: &Event<'_>) -> Result<bool, QueueError> {
        self.with(|ring| ring.try_push(event))
    }

    /// Poll an enqueue, registering the waker while the queue is full
    pub fn poll_send(&self, event: &Event<'_>, cx: &mut Context<'_>) -> Poll<Result<(), QueueError>> {
        self.with(|ring| match ring.try_push(event) {
            Ok(_) => Poll::Ready(Ok(())),
            Err(QueueError::Full) => {
                ring.senders_waker.register(cx.waker());
                Poll::Pending
            }
            Err(e) => Poll::Ready(Err(e)),
        })
    }

    /// Enqueue, waiting for a free slot according to `timeout`
    ///
    /// An elapsed timeout is reported as [`QueueError::Full`].
    pub async fn send(&self, event: &Event<'_>, timeout: PostTimeout) -> Result<(), QueueError> {
        match timeout {
            PostTimeout::Immediate => self.try_send(event).map(|_| ()),
            PostTimeout::Forever => poll_fn(|cx| self.poll_send(event, cx)).await,
            PostTimeout::After(duration) => {
                match with_timeout(duration, poll_fn(|cx| self.poll_send(event, cx))).await {
                    Ok(result) => result,
                    Err(_) => Err(QueueError::Full),
                }
            }
        }
    }

    /// Non-blocking dequeue of the oldest record into `out`
    pub fn try_receive(&self, out: &mut [u8]) -> Result<(), QueueError> {
        self.with(|ring| ring.try_pop(out))
    }

    /// Poll a dequeue, registering the waker while the queue is empty
    pub fn poll_receive(&self, out: &mut [u8], cx: &mut Context<'_>) -> Poll<Result<(), QueueError>> {
        self.with(|ring| match ring.try_pop(out) {
            Ok(()) => Poll::Ready(Ok(())),
            Err(QueueError::Empty) => {
                ring.receiver_waker.register(cx.waker());
                Poll::Pending
            }
            Err(e) => Poll::Ready(Err(e)),
        })
    }

    /// Dequeue the oldest record into `out`, waiting as long as needed
    pub async fn receive(&self, out: &mut [u8]) -> Result<(), QueueError> {
        poll_fn(|cx| self.poll_receive(out, cx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Signal;
    use embassy_futures::block_on;
    use embassy_time::Duration;
    use proptest::prelude::*;

    const ITEM_SIZE: usize = 6;

    fn signal_of(record: &[u8]) -> u16 {
        u16::from_le_bytes([record[0], record[1]])
    }

    #[test]
    fn test_bind_rejects_zero_sizes() {
        let mut storage = [0u8; 32];
        let queue = EventQueue::new();
        assert_eq!(queue.bind(0, 4, &mut storage), Err(QueueError::InvalidSize));

        let mut storage = [0u8; 32];
        let queue = EventQueue::new();
        assert_eq!(queue.bind(4, 0, &mut storage), Err(QueueError::InvalidSize));
    }

    #[test]
    fn test_bind_rejects_record_without_signal_room() {
        let mut storage = [0u8; 32];
        let queue = EventQueue::new();
        assert_eq!(queue.bind(1, 4, &mut storage), Err(QueueError::InvalidSize));
    }

    #[test]
    fn test_bind_rejects_small_storage() {
        let mut storage = [0u8; 11];
        let queue = EventQueue::new();
        assert_eq!(
            queue.bind(ITEM_SIZE, 2, &mut storage),
            Err(QueueError::StorageTooSmall)
        );
        assert!(!queue.is_bound());
    }

    #[test]
    fn test_bind_once() {
        let mut first = [0u8; 12];
        let mut second = [0u8; 12];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 2, &mut first).unwrap();
        assert_eq!(
            queue.bind(ITEM_SIZE, 2, &mut second),
            Err(QueueError::AlreadyBound)
        );
        assert_eq!(queue.capacity(), 2);
        assert_eq!(queue.item_size(), ITEM_SIZE);
    }

    #[test]
    fn test_unbound_operations() {
        let queue = EventQueue::new();
        let mut out = [0u8; ITEM_SIZE];
        assert_eq!(
            queue.try_send(&Event::new(Signal::USER)),
            Err(QueueError::Unbound)
        );
        assert_eq!(queue.try_receive(&mut out), Err(QueueError::Unbound));
        assert_eq!(queue.capacity(), 0);
        assert!(!queue.is_full());
    }

    #[test]
    fn test_fifo_and_wraparound() {
        let mut storage = [0u8; ITEM_SIZE * 3];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 3, &mut storage).unwrap();
        let mut out = [0u8; ITEM_SIZE];

        for round in 0..4u16 {
            for i in 0..3u16 {
                queue.try_send(&Event::new(Signal(round * 10 + i))).unwrap();
            }
            assert!(queue.is_full());
            for i in 0..3u16 {
                queue.try_receive(&mut out).unwrap();
                assert_eq!(signal_of(&out), round * 10 + i);
            }
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_full_and_empty() {
        let mut storage = [0u8; ITEM_SIZE];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 1, &mut storage).unwrap();
        let mut out = [0u8; ITEM_SIZE];

        assert_eq!(queue.try_receive(&mut out), Err(QueueError::Empty));
        queue.try_send(&Event::new(Signal::USER)).unwrap();
        assert_eq!(
            queue.try_send(&Event::new(Signal::USER)),
            Err(QueueError::Full)
        );
    }

    #[test]
    fn test_record_too_large() {
        let mut storage = [0u8; ITEM_SIZE * 2];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 2, &mut storage).unwrap();

        let payload = [0u8; ITEM_SIZE - SIGNAL_SIZE + 1];
        assert_eq!(
            queue.try_send(&Event::with_payload(Signal::USER, &payload)),
            Err(QueueError::RecordTooLarge)
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_receive_buffer_too_small() {
        let mut storage = [0u8; ITEM_SIZE * 2];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 2, &mut storage).unwrap();
        queue.try_send(&Event::new(Signal::USER)).unwrap();

        let mut out = [0u8; ITEM_SIZE - 1];
        assert_eq!(queue.try_receive(&mut out), Err(QueueError::InvalidSize));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_send_times_out_when_full() {
        let mut storage = [0u8; ITEM_SIZE];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 1, &mut storage).unwrap();
        queue.try_send(&Event::new(Signal::USER)).unwrap();

        let timeout = PostTimeout::After(Duration::from_millis(5));
        let result = block_on(queue.send(&Event::new(Signal::USER), timeout));
        assert_eq!(result, Err(QueueError::Full));
    }

    #[test]
    fn test_send_immediate_when_full() {
        let mut storage = [0u8; ITEM_SIZE];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 1, &mut storage).unwrap();
        queue.try_send(&Event::new(Signal::USER)).unwrap();

        let result = block_on(queue.send(&Event::new(Signal::USER), PostTimeout::Immediate));
        assert_eq!(result, Err(QueueError::Full));
    }

    #[test]
    fn test_blocked_send_completes_after_receive() {
        let mut storage = [0u8; ITEM_SIZE];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 1, &mut storage).unwrap();
        queue.try_send(&Event::new(Signal(10))).unwrap();

        std::thread::scope(|s| {
            let sender = s.spawn(|| block_on(queue.send(&Event::new(Signal(11)), PostTimeout::Forever)));

            let mut out = [0u8; ITEM_SIZE];
            block_on(queue.receive(&mut out)).unwrap();
            assert_eq!(signal_of(&out), 10);

            sender.join().unwrap().unwrap();
            block_on(queue.receive(&mut out)).unwrap();
            assert_eq!(signal_of(&out), 11);
        });
    }

    #[test]
    fn test_try_send_reports_parked_receiver() {
        use core::future::Future;
        use core::pin::pin;
        use core::task::Waker;

        let mut storage = [0u8; ITEM_SIZE * 2];
        let queue = EventQueue::new();
        queue.bind(ITEM_SIZE, 2, &mut storage).unwrap();

        // Nobody waiting yet
        assert_eq!(queue.try_send(&Event::new(Signal(20))), Ok(false));
        let mut out = [0u8; ITEM_SIZE];
        queue.try_receive(&mut out).unwrap();

        // Park a receiver on the empty queue
        let mut cx = Context::from_waker(Waker::noop());
        let mut receive = pin!(queue.receive(&mut out));
        assert!(receive.as_mut().poll(&mut cx).is_pending());

        assert_eq!(queue.try_send(&Event::new(Signal(21))), Ok(true));
        assert_eq!(receive.as_mut().poll(&mut cx), Poll::Ready(Ok(())));
    }

    proptest! {
        #[test]
        fn prop_payloads_survive_in_order(
            payloads in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..=ITEM_SIZE - SIGNAL_SIZE),
                1..=8,
            )
        ) {
            let mut storage = [0u8; ITEM_SIZE * 8];
            let queue = EventQueue::new();
            queue.bind(ITEM_SIZE, 8, &mut storage).unwrap();

            for (i, payload) in payloads.iter().enumerate() {
                queue.try_send(&Event::with_payload(Signal(i as u16), payload)).unwrap();
            }

            let mut out = [0u8; ITEM_SIZE];
            for (i, payload) in payloads.iter().enumerate() {
                queue.try_receive(&mut out).unwrap();
                let event = Event::read_record(&out).unwrap();
                prop_assert_eq!(event.signal(), Signal(i as u16));
                prop_assert_eq!(&event.payload()[..payload.len()], payload.as_slice());
                prop_assert!(event.payload()[payload.len()..].iter().all(|&b| b == 0));
            }
            prop_assert_eq!(queue.try_receive(&mut out), Err(QueueError::Empty));
        }
    }
}
