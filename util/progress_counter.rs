use num_traits::ToPrimitive;
use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

/**
A `ProgressCounter` tracks how far a long running task has come. Clones share the same atomics, so one clone can be handed to a display thread while the task advances another. The training loop restarts it at the beginning of every epoch with the number of examples in the epoch.

```
use snowcast_util::progress_counter::ProgressCounter;

let progress_counter = ProgressCounter::new(4);
let view = progress_counter.clone();
progress_counter.inc(3);
assert_eq!(view.get(), 3);
assert_eq!(view.fraction(), 0.75);
progress_counter.restart(10);
assert_eq!(view.get(), 0);
assert_eq!(view.total(), 10);
```
*/
#[derive(Clone, Debug, Default)]
pub struct ProgressCounter {
	current: Arc<AtomicU64>,
	total: Arc<AtomicU64>,
}

impl ProgressCounter {
	/// Create a new `ProgressCounter` that will count from 0 up to the specified `total`.
	pub fn new(total: u64) -> Self {
		Self {
			current: Arc::new(AtomicU64::new(0)),
			total: Arc::new(AtomicU64::new(total)),
		}
	}

	/// Reset the count to zero and set a new total.
	pub fn restart(&self, total: u64) {
		self.total.store(total, Ordering::Relaxed);
		self.current.store(0, Ordering::Relaxed);
	}

	pub fn total(&self) -> u64 {
		self.total.load(Ordering::Relaxed)
	}

	pub fn get(&self) -> u64 {
		self.current.load(Ordering::Relaxed)
	}

	pub fn inc(&self, amount: u64) {
		self.current.fetch_add(amount, Ordering::Relaxed);
	}

	/// The completed fraction in `[0, 1]`. A counter with a total of zero reports 1.
	pub fn fraction(&self) -> f32 {
		let total = self.total();
		if total == 0 {
			return 1.0;
		}
		let current = self.get().min(total);
		current.to_f32().unwrap() / total.to_f32().unwrap()
	}
}
