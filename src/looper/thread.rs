//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::thread::JoinHandle;

use looper::looper::MsgLooper;
use looper::Looper;
use support::{ErrorKind, LooperError, Result};

const LOG_TAG: &str = "LooperThread";

/// Owns an OS thread that prepares a looper and runs its loop.
///
/// The usual flavor spawns the thread lazily on the first `get_looper()`
/// call and hands the looper across with a startup handshake. The
/// in-current-thread flavor instead prepares a looper right away on the
/// constructing thread; running the loop is then the caller's job.
///
/// Dropping a `LooperThread` quits the looper (a no-op when a quit
/// already happened) and joins the spawned thread.
pub struct LooperThread {
	name: String,
	msg_pool_size: usize,
	looper_in_current_thread: bool,
	shared: Arc<Shared>,
	thread: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
	slot: Mutex<LooperSlot>,
	ready: Condvar,
}

struct LooperSlot {
	looper: Option<Looper>,
	exited: bool,
}

impl LooperThread {
	pub fn new(name: &str, msg_pool_size: usize, looper_in_current_thread: bool) -> LooperThread {
		let shared = Arc::new(Shared {
			slot: Mutex::new(LooperSlot {
				looper: None,
				exited: false,
			}),
			ready: Condvar::new(),
		});

		if looper_in_current_thread {
			let looper = MsgLooper::prepare_with_pool_size(msg_pool_size);
			shared.slot.lock().unwrap().looper = Some(looper);
		}

		LooperThread {
			name: String::from(name),
			msg_pool_size: msg_pool_size,
			looper_in_current_thread: looper_in_current_thread,
			shared: shared,
			thread: Mutex::new(None),
		}
	}

	/// Spawn the loop thread when it is not running yet. The spawned
	/// thread prepares its looper, publishes it for `get_looper()` and
	/// then pumps the loop until quit.
	pub fn start(&self) -> Result<()> {
		if self.looper_in_current_thread {
			return Ok(());
		}

		let mut handle = self.thread.lock().unwrap();
		if handle.is_some() {
			return Ok(());
		}

		let shared = self.shared.clone();
		let pool_size = self.msg_pool_size;
		let spawned = thread::Builder::new()
			.name(format!("thread-{}", self.name))
			.spawn(move || {
				let looper = MsgLooper::prepare_with_pool_size(pool_size);
				{
					let mut slot = shared.slot.lock().unwrap();
					slot.looper = Some(looper.clone());
					shared.ready.notify_all();
				}
				debug!(target: LOG_TAG, "looper thread entered its loop");
				if let Err(error) = looper.run() {
					error!(target: LOG_TAG, "looper left its loop with an error: {}", error);
				}
			});

		match spawned {
			Ok(join_handle) => {
				*handle = Some(join_handle);
				Ok(())
			}
			Err(error) => Err(LooperError::new(ErrorKind::Other, error)),
		}
	}

	/// The looper this thread runs, starting the thread first when
	/// needed. Blocks until the loop thread has prepared its looper;
	/// this handshake is the one legitimate cross-thread wait in the
	/// kit.
	pub fn get_looper(&self) -> Result<Looper> {
		if !self.looper_in_current_thread {
			self.start()?;
		}

		let mut slot = self.shared.slot.lock().unwrap();
		loop {
			if let Some(ref looper) = slot.looper {
				return Ok(looper.clone());
			}
			slot = self.shared.ready.wait(slot).unwrap();
		}
	}

	/// Hard quit: pending messages are dropped. Returns true once a
	/// quit, of either kind, has been requested.
	pub fn quit(&self) -> bool {
		self.quit_with(false)
	}

	/// Safe quit: pending messages are dispatched before the loop exits.
	pub fn quit_safely(&self) -> bool {
		self.quit_with(true)
	}

	pub fn has_exited(&self) -> bool {
		self.shared.slot.lock().unwrap().exited
	}

	fn quit_with(&self, safely: bool) -> bool {
		let mut slot = self.shared.slot.lock().unwrap();
		if slot.exited {
			return true;
		}

		match slot.looper {
			Some(ref looper) => {
				looper.quit(safely);
				slot.exited = true;
				true
			}
			None => false,
		}
	}
}

impl Drop for LooperThread {
	fn drop(&mut self) {
		self.quit();
		if let Some(handle) = self.thread.lock().unwrap().take() {
			// Pending messages may reference state living on other
			// stacks; always join, never detach.
			if handle.join().is_err() {
				error!(target: LOG_TAG, "looper thread panicked before exiting");
			}
		}
	}
}
