//! Deferred single-flight evaluation.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

type Thunk<T> = Box<dyn FnOnce() -> T + Send>;

/// A value computed at most once, on first access.
///
/// Concurrent first accesses race into `OnceCell::get_or_init`, which blocks
/// the losers until the winner's thunk finishes, so the computation runs
/// exactly once and every caller observes the same value.
pub struct Lazy<T> {
	cell: OnceCell<T>,
	thunk: Mutex<Option<Thunk<T>>>,
}

impl<T> Lazy<T> {
	pub fn new(thunk: impl FnOnce() -> T + Send + 'static) -> Self {
		Self {
			cell: OnceCell::new(),
			thunk: Mutex::new(Some(Box::new(thunk))),
		}
	}

	/// An already-resolved value; no thunk will ever run.
	pub fn ready(value: T) -> Self {
		let cell = OnceCell::new();
		let _ = cell.set(value);
		Self {
			cell,
			thunk: Mutex::new(None),
		}
	}

	pub fn get(&self) -> &T {
		self.cell.get_or_init(|| {
			let thunk = self
				.thunk
				.lock()
				.take()
				.expect("thunk taken without initializing the cell");
			thunk()
		})
	}

	pub fn is_resolved(&self) -> bool {
		self.cell.get().is_some()
	}
}

impl<T: std::fmt::Debug> std::fmt::Debug for Lazy<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.cell.get() {
			Some(value) => f.debug_tuple("Lazy").field(value).finish(),
			None => f.write_str("Lazy(<pending>)"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::thread;

	#[test]
	fn thunk_runs_exactly_once_across_threads() {
		let counter = Arc::new(AtomicU32::new(0));
		let lazy = {
			let counter = Arc::clone(&counter);
			Arc::new(Lazy::new(move || {
				counter.fetch_add(1, Ordering::SeqCst);
				42u32
			}))
		};

		let handles: Vec<_> = (0..8)
			.map(|_| {
				let lazy = Arc::clone(&lazy);
				thread::spawn(move || *lazy.get())
			})
			.collect();
		for handle in handles {
			assert_eq!(handle.join().unwrap(), 42);
		}
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn ready_never_invokes_anything() {
		let lazy = Lazy::ready("done");
		assert!(lazy.is_resolved());
		assert_eq!(*lazy.get(), "done");
	}

	#[test]
	fn unresolved_until_first_access() {
		let lazy = Lazy::new(|| 1);
		assert!(!lazy.is_resolved());
		lazy.get();
		assert!(lazy.is_resolved());
	}
}
