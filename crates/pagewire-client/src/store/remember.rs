use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Deref;
use std::rc::Rc;

use pagewire_core::reactive::{Effect, Signal};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::context::Session;

/// Keyed plain-data snapshots of remembered state.
///
/// Owned by the [`Session`]; clones share the same table. Values are stored as
/// `serde_json::Value`, never as live signals.
#[derive(Clone, Debug, Default)]
pub struct RememberTable {
	entries: Rc<RefCell<BTreeMap<String, Value>>>,
}

impl RememberTable {
	/// An empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot stored under `key`.
	pub fn get(&self, key: &str) -> Option<Value> {
		self.entries.borrow().get(key).cloned()
	}

	/// Stores a snapshot.
	pub fn insert(&self, key: impl Into<String>, value: Value) {
		self.entries.borrow_mut().insert(key.into(), value);
	}

	/// Removes a snapshot.
	pub fn remove(&self, key: &str) -> Option<Value> {
		self.entries.borrow_mut().remove(key)
	}

	/// Drops every snapshot.
	pub fn clear(&self) {
		self.entries.borrow_mut().clear();
	}

	/// Number of keys.
	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	/// Whether the table is empty.
	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}

	/// The whole table as a JSON object, as written into history entries.
	pub fn snapshot(&self) -> Map<String, Value> {
		self.entries
			.borrow()
			.iter()
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect()
	}

	/// Replaces the whole table with a snapshot read back from history.
	pub fn restore(&self, snapshot: Map<String, Value>) {
		*self.entries.borrow_mut() = snapshot.into_iter().collect();
	}
}

/// Remembered state: a signal whose value is mirrored into the [`RememberTable`].
///
/// Dereferences to the [`Signal`]. Dropping it stops the mirroring; the last
/// snapshot stays in the table.
pub struct Remembered<T: 'static> {
	signal: Signal<T>,
	key: String,
	_sync: Effect,
}

impl<T: 'static> Remembered<T> {
	/// Key this state is remembered under.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// The underlying signal.
	pub fn signal(&self) -> Signal<T> {
		self.signal.clone()
	}
}

impl<T: 'static> Deref for Remembered<T> {
	type Target = Signal<T>;

	fn deref(&self) -> &Signal<T> {
		&self.signal
	}
}

/// Creates (or resumes) remembered state under `key`.
///
/// If the session's table already has a snapshot for `key` it wins over
/// `initial`; this is how in-progress input survives navigating away and back.
/// Every change is written back to the table and folded into the current
/// history entry.
///
/// Unrelated features sharing one key overwrite each other; pick distinct keys
/// for state that is alive at the same time.
///
/// ```
/// use pagewire_client::context::Session;
/// use pagewire_client::store::use_remember;
///
/// let session = Session::in_memory("/search");
/// let query = use_remember(&session, String::new(), "search");
/// query.set("rust".to_string());
///
/// drop(query);
/// let resumed = use_remember(&session, String::new(), "search");
/// assert_eq!(resumed.get_untracked(), "rust");
/// ```
pub fn use_remember<T>(session: &Session, initial: T, key: impl Into<String>) -> Remembered<T>
where
	T: Serialize + DeserializeOwned + PartialEq + Clone + 'static,
{
	let key = key.into();
	let table = session.remember();

	let seed = match table.get(&key) {
		Some(stored) => match serde_json::from_value::<T>(stored) {
			Ok(value) => value,
			Err(error) => {
				tracing::warn!(key = %key, %error, "remembered state has an unexpected shape; using initial value");
				initial
			}
		},
		None => initial,
	};
	let signal = Signal::new(seed);

	let sync = Effect::new({
		let signal = signal.clone();
		let session = session.clone();
		let key = key.clone();
		move || {
			let plain = signal.with(|value| serde_json::to_value(value));
			match plain {
				Ok(value) => {
					session.remember().insert(key.clone(), value);
					session.history().sync_remember();
				}
				Err(error) => {
					tracing::error!(key = %key, %error, "remembered state is not serializable");
				}
			}
		}
	});

	Remembered {
		signal,
		key,
		_sync: sync,
	}
}
