//! Request triggers: polling, visibility and hover.
//!
//! The DOM wiring (intersection observers, pointer listeners) stays with the
//! host; these types hold the timing and deduplication rules and are driven by
//! calling their handlers.

mod hover;
mod poll;
mod visible;

pub use hover::HoverPrefetch;
pub use poll::{MIN_POLL_INTERVAL, Poll};
pub use visible::WhenVisible;
