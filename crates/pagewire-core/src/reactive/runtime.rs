//! Reactive Runtime
//!
//! This module owns the dependency graph between signals and effects and the
//! observer stack that attributes signal reads to the computation currently
//! being evaluated.
//!
//! ## Architecture
//!
//! 1. **Observer Stack**: the top frame is the effect currently running, or an
//!    untracked frame pushed by [`untrack`]
//! 2. **Dependency Tracking**: `Signal::get()` records a signal -> effect edge for
//!    the top frame
//! 3. **Synchronous Propagation**: a changed signal re-runs its subscribers before
//!    the write returns; subscriber sets are ordered by node id, so dependents run
//!    in the order they were created
//! 4. **Re-tracking**: an effect's dependencies are cleared before every run and
//!    rebuilt from the reads of that run
//!
//! The runtime is thread-local. In WASM there is only one thread, so this is
//! effectively a global runtime.

use core::cell::RefCell;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::collections::{BTreeMap, BTreeSet};

/// Identity of a signal or effect in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
	/// Create a new unique NodeId. Ids increase monotonically.
	pub fn new() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl Default for NodeId {
	fn default() -> Self {
		Self::new()
	}
}

impl core::fmt::Display for NodeId {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Edges of one node.
#[derive(Debug, Default)]
pub(crate) struct DependencyNode {
	/// Effects that read this node (only populated for signals)
	pub(crate) subscribers: BTreeSet<NodeId>,
	/// Signals this node read during its last run (only populated for effects)
	pub(crate) dependencies: BTreeSet<NodeId>,
}

/// Reactive runtime state for the current thread.
pub struct Runtime {
	/// `Some(id)` while effect `id` is evaluating, `None` for untracked frames
	observer_stack: RefCell<Vec<Option<NodeId>>>,
	/// Edges keyed by node
	pub(crate) dependency_graph: RefCell<BTreeMap<NodeId, DependencyNode>>,
	/// Effects currently executing; used to refuse re-entrant runs
	running: RefCell<BTreeSet<NodeId>>,
}

impl Runtime {
	/// An empty runtime with no observer.
	pub fn new() -> Self {
		Self {
			observer_stack: RefCell::new(Vec::new()),
			dependency_graph: RefCell::new(BTreeMap::new()),
			running: RefCell::new(BTreeSet::new()),
		}
	}

	/// The effect whose reads are being recorded, if any
	pub fn current_observer(&self) -> Option<NodeId> {
		self.observer_stack.borrow().last().copied().flatten()
	}

	/// Push an observer frame. `None` suspends tracking until the frame is popped.
	pub fn push_observer(&self, observer: Option<NodeId>) {
		self.observer_stack.borrow_mut().push(observer);
	}

	/// Pop the top observer frame
	pub fn pop_observer(&self) -> Option<Option<NodeId>> {
		self.observer_stack.borrow_mut().pop()
	}

	/// Records that the current observer read `signal_id`.
	///
	/// Edges are sets, so repeated reads within one evaluation register once.
	pub fn track_dependency(&self, signal_id: NodeId) {
		if let Some(observer_id) = self.current_observer() {
			let mut graph = self.dependency_graph.borrow_mut();
			graph
				.entry(signal_id)
				.or_default()
				.subscribers
				.insert(observer_id);
			graph
				.entry(observer_id)
				.or_default()
				.dependencies
				.insert(signal_id);
		}
	}

	/// Snapshot of the current subscribers of a signal, in creation order
	pub fn subscribers(&self, signal_id: NodeId) -> Vec<NodeId> {
		self.dependency_graph
			.borrow()
			.get(&signal_id)
			.map(|node| node.subscribers.iter().copied().collect())
			.unwrap_or_default()
	}

	/// Marks an effect as running. Returns `false` if it was already running.
	pub(crate) fn begin_run(&self, effect_id: NodeId) -> bool {
		self.running.borrow_mut().insert(effect_id)
	}

	pub(crate) fn end_run(&self, effect_id: NodeId) {
		self.running.borrow_mut().remove(&effect_id);
	}

	/// Drops every edge from `node_id` to the signals it read.
	///
	/// Called before re-executing an Effect so abandoned branches stop notifying it.
	pub fn clear_dependencies(&self, node_id: NodeId) {
		let mut graph = self.dependency_graph.borrow_mut();

		let dependencies = match graph.get_mut(&node_id) {
			Some(node) => core::mem::take(&mut node.dependencies),
			None => return,
		};

		for dep_id in dependencies {
			if let Some(dep_node) = graph.get_mut(&dep_id) {
				dep_node.subscribers.remove(&node_id);
			}
		}
	}

	/// Forgets `node_id` entirely.
	///
	/// Removing a signal also detaches it from every effect that read it.
	pub fn remove_node(&self, node_id: NodeId) {
		self.clear_dependencies(node_id);
		let mut graph = self.dependency_graph.borrow_mut();
		if let Some(node) = graph.remove(&node_id) {
			for subscriber in node.subscribers {
				if let Some(effect_node) = graph.get_mut(&subscriber) {
					effect_node.dependencies.remove(&node_id);
				}
			}
		}
	}

	/// Whether `node_id` has any edge recorded.
	pub fn has_node(&self, node_id: NodeId) -> bool {
		self.dependency_graph.borrow().contains_key(&node_id)
	}

	/// How many effects read `node_id`.
	pub fn subscriber_count(&self, node_id: NodeId) -> usize {
		self.dependency_graph
			.borrow()
			.get(&node_id)
			.map(|node| node.subscribers.len())
			.unwrap_or(0)
	}

	/// How many signals `node_id` read on its last run.
	pub fn dependency_count(&self, node_id: NodeId) -> usize {
		self.dependency_graph
			.borrow()
			.get(&node_id)
			.map(|node| node.dependencies.len())
			.unwrap_or(0)
	}
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new()
	}
}

thread_local! {
	static RUNTIME: Runtime = Runtime::new();
}

/// Runs `f` against this thread's runtime.
///
/// # Example
///
/// ```
/// use pagewire_core::reactive::{Signal, with_runtime};
///
/// let signal = Signal::new(1);
/// assert_eq!(with_runtime(|rt| rt.subscriber_count(signal.id())), 0);
/// ```
pub fn with_runtime<F, R>(f: F) -> R
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.with(f)
}

/// Like [`with_runtime`], but `None` once thread-local storage is torn down.
pub(crate) fn try_with_runtime<F, R>(f: F) -> Option<R>
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.try_with(f).ok()
}

/// Pops the observer frame it was created for, even when unwinding.
pub(crate) struct ObserverGuard;

impl ObserverGuard {
	pub(crate) fn push(observer: Option<NodeId>) -> Self {
		with_runtime(|rt| rt.push_observer(observer));
		Self
	}
}

impl Drop for ObserverGuard {
	fn drop(&mut self) {
		let _ = try_with_runtime(|rt| rt.pop_observer());
	}
}

/// Runs `f` without recording signal reads as dependencies of the current effect.
///
/// ```
/// use pagewire_core::reactive::{Effect, Signal, untrack, with_runtime};
///
/// let signal = Signal::new(1);
/// let effect = Effect::new({
///     let signal = signal.clone();
///     move || {
///         untrack(|| signal.get());
///     }
/// });
/// assert_eq!(with_runtime(|rt| rt.dependency_count(effect.id())), 0);
/// ```
pub fn untrack<F, R>(f: F) -> R
where
	F: FnOnce() -> R,
{
	let _guard = ObserverGuard::push(None);
	f()
}
