//! Reactive state that lives across navigations.
//!
//! - [`PageStore`]: the current page, with structural change suppression
//! - [`RememberTable`] / [`use_remember`]: keyed state that survives page
//!   replacement and is folded into history entries

mod page;
mod remember;

pub use page::PageStore;
pub use remember::{RememberTable, Remembered, use_remember};
