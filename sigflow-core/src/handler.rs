//! State handler contract
//!
//! A state is a plain function. It receives the handler context and one
//! event and reports what it did with a [`Status`]. Switching states is
//! requested by returning [`Status::Transition`] with the target handler;
//! the dispatcher then runs the EXIT/ENTRY sequence.

use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::error::Error;
use crate::event::Event;
use crate::poster::Poster;

/// A state of a flat state machine over application data `C`
pub type StateHandler<C> = fn(&mut Context<'_, C>, &Event<'_>) -> Status<C>;

/// Outcome of handling one event
pub enum Status<C> {
    /// Handler reported nothing
    Unhandled,
    /// Event consumed
    Handled,
    /// Event not relevant in this state
    Ignored,
    /// Leave this state for the given one
    Transition(StateHandler<C>),
}

impl<C> Status<C> {
    pub fn is_transition(&self) -> bool {
        matches!(self, Status::Transition(_))
    }

    /// Transition target, if any
    pub fn target(&self) -> Option<StateHandler<C>> {
        match self {
            Status::Transition(target) => Some(*target),
            _ => None,
        }
    }
}

// Manual impls: derives would require `C: Clone` etc.
impl<C> Clone for Status<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Status<C> {}

impl<C> PartialEq for Status<C> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Status::Unhandled, Status::Unhandled)
            | (Status::Handled, Status::Handled)
            | (Status::Ignored, Status::Ignored) => true,
            (Status::Transition(a), Status::Transition(b)) => core::ptr::fn_addr_eq(*a, *b),
            _ => false,
        }
    }
}

impl<C> Eq for Status<C> {}

impl<C> fmt::Debug for Status<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unhandled => f.write_str("Unhandled"),
            Status::Handled => f.write_str("Handled"),
            Status::Ignored => f.write_str("Ignored"),
            Status::Transition(target) => f
                .debug_tuple("Transition")
                .field(&(*target as *const ()))
                .finish(),
        }
    }
}

#[cfg(feature = "defmt")]
impl<C> defmt::Format for Status<C> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Status::Unhandled => defmt::write!(fmt, "Unhandled"),
            Status::Handled => defmt::write!(fmt, "Handled"),
            Status::Ignored => defmt::write!(fmt, "Ignored"),
            Status::Transition(_) => defmt::write!(fmt, "Transition"),
        }
    }
}

/// What a state handler can reach
///
/// Derefs to the application data. Posting from here never waits: the
/// handler runs on the consumer, which is the only task that frees slots.
#[derive(Debug)]
pub struct Context<'a, C> {
    app: C,
    poster: Poster<'a>,
}

impl<'a, C> Context<'a, C> {
    pub(crate) fn new(app: C, poster: Poster<'a>) -> Self {
        Self { app, poster }
    }

    /// Post an event to this dispatcher without waiting
    pub fn post(&self, event: &Event<'_>) -> Result<(), Error> {
        self.poster.try_post(event)
    }

    /// Handle for posting from elsewhere
    pub fn poster(&self) -> Poster<'a> {
        self.poster
    }

    pub fn app(&self) -> &C {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut C {
        &mut self.app
    }
}

impl<C> Deref for Context<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.app
    }
}

impl<C> DerefMut for Context<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.app
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Signal;

    fn idle(_: &mut Context<'_, ()>, _: &Event<'_>) -> Status<()> {
        Status::Handled
    }

    fn busy(_: &mut Context<'_, ()>, _: &Event<'_>) -> Status<()> {
        Status::Ignored
    }

    #[test]
    fn test_status_target() {
        let status: Status<()> = Status::Transition(busy);
        assert!(status.is_transition());
        assert!(status.target().is_some());
        assert!(Status::<()>::Handled.target().is_none());
        assert!(!Status::<()>::Ignored.is_transition());
    }

    #[test]
    fn test_status_eq() {
        assert_eq!(Status::<()>::Handled, Status::Handled);
        assert_ne!(Status::<()>::Handled, Status::Ignored);
        assert_eq!(Status::<()>::Transition(idle), Status::Transition(idle));
        assert_ne!(Status::<()>::Transition(idle), Status::Transition(busy));
    }

    #[test]
    fn test_handler_call() {
        let queue = crate::queue::EventQueue::new();
        let poster = Poster::new(&queue, Default::default());
        let mut ctx = Context::new((), poster);
        let handler: StateHandler<()> = idle;
        assert_eq!(handler(&mut ctx, &Event::new(Signal::USER)), Status::Handled);
    }
}
