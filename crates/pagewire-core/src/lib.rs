//! # pagewire-core
//!
//! Building blocks shared by every pagewire crate:
//!
//! - [`reactive`]: a synchronous, dependency-tracking signal graph (`Signal`, `Effect`)
//! - [`value`]: depth-bounded structural equality, merge helpers and file blobs over `serde_json::Value`
//! - [`page`]: the `Page` descriptor exchanged with the server
//!
//! ## Example
//!
//! ```
//! use pagewire_core::reactive::{Effect, Signal};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let count = Signal::new(0);
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let _effect = Effect::new({
//!     let count = count.clone();
//!     let seen = seen.clone();
//!     move || seen.borrow_mut().push(count.get())
//! });
//!
//! count.set(1);
//! count.set(1); // equal value, no propagation
//! assert_eq!(*seen.borrow(), vec![0, 1]);
//! ```

#![warn(missing_docs)]

pub mod page;
pub mod reactive;
pub mod spawn;
pub mod value;

pub use page::{Page, PageError, ScrollPosition};
pub use reactive::{Cleanup, Effect, EffectError, Signal, untrack, with_runtime};
pub use value::{FileBlob, deep_equal, pages_equal};
