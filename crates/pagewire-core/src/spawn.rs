//! Local task spawning.
//!
//! Everything in pagewire runs on a single thread, so tasks are `!Send` futures
//! spawned onto the current thread's executor:
//!
//! - WASM: `wasm_bindgen_futures::spawn_local`
//! - Native: `tokio::task::spawn_local` (must be called inside a `tokio::task::LocalSet`)
//!
//! A custom spawner can be installed per thread with [`set_spawner`], e.g. for an
//! embedder that drives its own executor.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

thread_local! {
	static SPAWNER: RefCell<Option<Spawner>> = const { RefCell::new(None) };
}

/// Installs the spawner used by [`spawn_local`] on this thread.
///
/// ```
/// use pagewire_core::spawn::{set_spawner, spawn_local};
/// use futures::FutureExt;
///
/// set_spawner(|task| {
///     let _ = task.now_or_never();
/// });
/// spawn_local(async {});
/// ```
pub fn set_spawner<F>(spawner: F)
where
	F: Fn(LocalBoxFuture<'static, ()>) + 'static,
{
	SPAWNER.with(|slot| *slot.borrow_mut() = Some(Rc::new(spawner)));
}

/// Removes a spawner installed with [`set_spawner`].
pub fn clear_spawner() {
	SPAWNER.with(|slot| slot.borrow_mut().take());
}

/// Spawns a fire-and-forget task on the current thread.
pub fn spawn_local<F>(future: F)
where
	F: Future<Output = ()> + 'static,
{
	let custom = SPAWNER.with(|slot| slot.borrow().clone());
	match custom {
		Some(spawner) => spawner(future.boxed_local()),
		None => spawn_platform(future),
	}
}

#[cfg(all(target_family = "wasm", target_os = "unknown"))]
fn spawn_platform<F>(future: F)
where
	F: Future<Output = ()> + 'static,
{
	wasm_bindgen_futures::spawn_local(future);
}

#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
fn spawn_platform<F>(future: F)
where
	F: Future<Output = ()> + 'static,
{
	drop(tokio::task::spawn_local(future));
}

#[cfg(test)]
mod tests {
	use super::*;
	use serial_test::serial;
	use std::cell::Cell;

	#[test]
	#[serial]
	fn test_custom_spawner_receives_task() {
		let ran = Rc::new(Cell::new(false));
		set_spawner(|task| {
			let _ = task.now_or_never();
		});

		spawn_local({
			let ran = ran.clone();
			async move { ran.set(true) }
		});
		clear_spawner();

		assert!(ran.get());
	}

	#[tokio::test(flavor = "current_thread")]
	#[serial]
	async fn test_default_spawner_uses_local_set() {
		let local = tokio::task::LocalSet::new();
		let ran = Rc::new(Cell::new(false));

		local
			.run_until({
				let ran = ran.clone();
				async move {
					spawn_local(async move { ran.set(true) });
					tokio::task::yield_now().await;
				}
			})
			.await;

		assert!(ran.get());
	}
}
