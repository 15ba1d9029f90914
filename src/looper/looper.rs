//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

use std::any::Any;
use std::cell::RefCell;
use std::panic;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kernel::threads;
use looper::queue::MsgQueue;
use looper::{Looper, Queue, DEFAULT_MSG_POOL_SIZE};
use support::{ErrorKind, LooperError, Result};

const LOG_TAG: &str = "MessageLooper";

thread_local! {
	static THREAD_LOOPER: RefCell<Option<Looper>> = RefCell::new(None);
}

/// The per-thread driver that pumps one message queue.
///
/// A thread calls `prepare()` once to install a looper in its
/// thread-local slot, hands out handlers bound to it, and then calls
/// `run()` to dispatch messages until the queue quits. Other threads
/// only ever touch the looper through its queue, its thread id and the
/// quit flag.
pub struct MsgLooper {
	queue: Queue,
	thread_id: u64,
	exited: AtomicBool,
	promote_thread_level: AtomicBool,
}

impl MsgLooper {
	/// Install a looper for the calling thread, with the default pool
	/// size. Idempotent: a thread that already prepared gets its
	/// existing looper back.
	pub fn prepare() -> Looper {
		Self::prepare_with_pool_size(DEFAULT_MSG_POOL_SIZE)
	}

	pub fn prepare_with_pool_size(msg_pool_size: usize) -> Looper {
		THREAD_LOOPER.with(|slot| {
			let mut slot = slot.borrow_mut();
			if let Some(ref looper) = *slot {
				return looper.clone();
			}

			let thread_id = threads::current_thread_id();
			let name = format!("Thread_{}_MsgQueue", thread_id);
			debug!(target: LOG_TAG, "preparing looper with queue '{}'", name);
			let looper = Arc::new(MsgLooper {
				queue: Arc::new(MsgQueue::new(&name, msg_pool_size)),
				thread_id: thread_id,
				exited: AtomicBool::new(false),
				promote_thread_level: AtomicBool::new(false),
			});
			*slot = Some(looper.clone());
			looper
		})
	}

	/// The calling thread's looper, or an error when `prepare()` was
	/// never called on this thread.
	pub fn my_looper() -> Result<Looper> {
		THREAD_LOOPER.with(|slot| match *slot.borrow() {
			Some(ref looper) => Ok(looper.clone()),
			None => {
				error!(
					target: LOG_TAG,
					"current thread has no looper; call MsgLooper::prepare() first"
				);
				Err(ErrorKind::NoLooper.into())
			}
		})
	}

	/// Dispatch messages until the queue returns the exit sentinel.
	///
	/// Must run on the thread that prepared this looper. A panic leaving
	/// a callback is caught so the message can be recycled; it is then
	/// logged and the loop continues, unless the `abort-on-panic`
	/// feature promotes it to a process abort.
	pub fn run(&self) -> Result<()> {
		if threads::current_thread_id() != self.thread_id {
			return Err(LooperError::new(
				ErrorKind::InvalidInput,
				"the loop must run on the thread that prepared the looper",
			));
		}

		loop {
			if self.exited.load(Ordering::Relaxed)
				&& self.promote_thread_level.swap(false, Ordering::Relaxed)
			{
				// Draining after a safe quit; try to finish sooner.
				threads::promote_current_thread();
			}

			let msg = match self.queue.next() {
				Some(msg) => msg,
				None => {
					info!(target: LOG_TAG, "no more messages, leaving the loop");
					return Ok(());
				}
			};

			match msg.target.as_ref().and_then(|target| target.upgrade()) {
				Some(handler) => {
					let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| {
						handler.dispatch_message(&msg);
					}));
					// The message left the queue before dispatch; it
					// goes back to the pool before the fault is acted
					// on.
					self.queue.recycle_msg(msg);
					if let Err(fault) = outcome {
						error!(
							target: LOG_TAG,
							"a callback panicked during dispatch: {}",
							describe_panic(&fault)
						);
						if cfg!(feature = "abort-on-panic") {
							process::abort();
						}
					}
				}
				None => {
					warn!(
						target: LOG_TAG,
						"dropping message {} for a handler that no longer exists",
						msg.what
					);
					self.queue.recycle_msg(msg);
				}
			}
		}
	}

	/// Stop the loop. A hard quit (`safely == false`) drops everything
	/// still pending; a safe quit lets the loop drain first and asks for
	/// a scheduling priority bump to speed the drain up. Only the first
	/// call does anything.
	pub fn quit(&self, safely: bool) {
		if self.exited.swap(true, Ordering::Relaxed) {
			return;
		}

		if safely {
			self.promote_thread_level.store(true, Ordering::Relaxed);
		}
		self.queue.quit(safely);
	}

	pub fn had_exit(&self) -> bool {
		self.exited.load(Ordering::Relaxed)
	}

	pub fn get_thread_id(&self) -> u64 {
		self.thread_id
	}

	pub fn get_msg_queue(&self) -> Queue {
		self.queue.clone()
	}

	/// Plumb the queue's test wait time: with it set, an empty queue
	/// returns the exit sentinel after this many milliseconds instead of
	/// blocking indefinitely.
	pub fn set_test_wait_time(&self, millis: u64) {
		self.queue.set_test_out_time(millis);
	}
}

impl Drop for MsgLooper {
	fn drop(&mut self) {
		self.quit(false);
	}
}

fn describe_panic(fault: &Box<dyn Any + Send>) -> &str {
	if let Some(message) = fault.downcast_ref::<&str>() {
		message
	} else if let Some(message) = fault.downcast_ref::<String>() {
		message
	} else {
		"opaque panic payload"
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::thread;
	use std::time::{Duration, Instant};

	#[test]
	fn my_looper_requires_prepare() {
		let result = thread::spawn(|| MsgLooper::my_looper().is_err())
			.join()
			.unwrap();
		assert!(result);
	}

	#[test]
	fn prepare_is_idempotent_per_thread() {
		thread::spawn(|| {
			let first = MsgLooper::prepare();
			let second = MsgLooper::prepare();
			assert!(Arc::ptr_eq(&first, &second));
			assert!(MsgLooper::my_looper().is_ok());
			assert_eq!(first.get_thread_id(), threads::current_thread_id());
			assert!(first
				.get_msg_queue()
				.get_name()
				.starts_with("Thread_"));
		})
		.join()
		.unwrap();
	}

	#[test]
	fn distinct_threads_get_distinct_loopers() {
		let here = MsgLooper::prepare();
		let there = thread::spawn(|| MsgLooper::prepare()).join().unwrap();
		assert!(!Arc::ptr_eq(&here, &there));
	}

	#[test]
	fn run_refuses_foreign_threads() {
		let looper = thread::spawn(|| MsgLooper::prepare()).join().unwrap();
		assert!(looper.run().is_err());
	}

	#[test]
	fn test_wait_time_bounds_an_empty_loop() {
		thread::spawn(|| {
			let looper = MsgLooper::prepare();
			looper.set_test_wait_time(30);
			let started = Instant::now();
			assert!(looper.run().is_ok());
			let elapsed = started.elapsed();
			assert!(elapsed >= Duration::from_millis(30));
			assert!(elapsed < Duration::from_secs(5));
		})
		.join()
		.unwrap();
	}

	#[test]
	fn quit_is_sticky() {
		thread::spawn(|| {
			let looper = MsgLooper::prepare();
			assert!(!looper.had_exit());
			looper.quit(false);
			assert!(looper.had_exit());
			looper.quit(true);
			assert!(looper.had_exit());
			assert!(looper.run().is_ok());
		})
		.join()
		.unwrap();
	}
}
