use snowcast_util::progress_counter::ProgressCounter;
use std::{
	io::Write,
	sync::mpsc::{channel, Receiver, Sender, TryRecvError},
	thread::{sleep, spawn, JoinHandle},
	time::Duration,
};

enum Message {
	Epoch(usize),
	Done,
}

/// Draws the progress of the running epoch on stderr from a background thread.
pub struct ProgressView {
	thread: Option<JoinHandle<()>>,
	sender: Sender<Message>,
}

impl ProgressView {
	pub fn new(progress_counter: ProgressCounter, n_epochs: usize) -> ProgressView {
		let (sender, receiver) = channel::<Message>();
		let thread = Some(spawn(move || {
			thread_main(progress_counter, n_epochs, receiver)
		}));
		ProgressView { thread, sender }
	}

	/// Announce that `epoch` (1-based) is starting.
	pub fn start_epoch(&self, epoch: usize) {
		self.sender.send(Message::Epoch(epoch)).ok();
	}
}

impl Drop for ProgressView {
	fn drop(&mut self) {
		self.sender.send(Message::Done).ok();
		if let Some(thread) = self.thread.take() {
			thread.join().ok();
		}
	}
}

fn thread_main(progress_counter: ProgressCounter, n_epochs: usize, receiver: Receiver<Message>) {
	let mut epoch = None;
	let mut stderr = std::io::stderr();
	loop {
		match receiver.try_recv() {
			Err(TryRecvError::Empty) => {}
			Err(TryRecvError::Disconnected) | Ok(Message::Done) => break,
			Ok(Message::Epoch(new_epoch)) => epoch = Some(new_epoch),
		};
		if let Some(epoch) = epoch {
			write!(
				stderr,
				"\repoch {}/{}: {:>3.0}%",
				epoch,
				n_epochs,
				progress_counter.fraction() * 100.0
			)
			.ok();
			stderr.flush().ok();
		}
		sleep(Duration::from_millis(50));
	}
	if epoch.is_some() {
		write!(stderr, "\r\x1b[K").ok();
		stderr.flush().ok();
	}
}
