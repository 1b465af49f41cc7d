use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

/**
A `CancellationToken` is a flag that one task sets and another task polls. The training loop polls it at epoch boundaries only, so setting it never interrupts an epoch that is already running.

```
use snowcast_util::cancellation::CancellationToken;

let token = CancellationToken::new();
let handle = token.clone();
assert!(!token.is_cancelled());
handle.cancel();
assert!(token.is_cancelled());
```
*/
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	/// Request cancellation. Every clone of this token observes the request.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

#[test]
fn test_cancel_from_another_thread() {
	let token = CancellationToken::new();
	let handle = token.clone();
	std::thread::spawn(move || handle.cancel()).join().unwrap();
	assert!(token.is_cancelled());
}
