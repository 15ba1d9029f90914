//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use kernel::time::monotonic_ms;
use looper::handler::MsgHandler;
use looper::message::Msg;
use looper::{Handler, HandlerCallback, IdleHandlerFn, Message, Runnable};
use support::{ErrorKind, Result};

const LOG_TAG: &str = "MessageQueue";

/// A priority-ordered message queue with an embedded recycle pool.
///
/// The queue exclusively owns every message in its pending list and in
/// its pool. Producers on any thread enqueue through a handler; exactly
/// one consumer, the looper that owns the queue, blocks in `next()`.
///
/// Two locks: the queue lock guards the pending list and the lifecycle
/// flags, the pool lock guards the recycle pool. Lock order is always
/// queue before pool. User code (callbacks, payload release functions)
/// never runs under either lock.
pub struct MsgQueue {
	state: Mutex<QueueState>,
	cond: Condvar,
	pool: Mutex<MsgPool>,
	// Mirror of `QueueState::quit` for the pool path, which must not
	// take the queue lock.
	quit: AtomicBool,
}

struct QueueState {
	name: String,
	head: Option<Message>,
	size: usize,
	blocked: bool,
	quit: bool,
	not_enqueueing: bool,
	out_time_test: u64,
	idle_handler: Option<IdleHandlerFn>,
}

struct MsgPool {
	head: Option<Message>,
	size: usize,
	max_size: usize,
	full: bool,
}

impl MsgQueue {
	pub fn new(name: &str, max_pool_size: usize) -> MsgQueue {
		MsgQueue {
			state: Mutex::new(QueueState {
				name: String::from(name),
				head: None,
				size: 0,
				blocked: true,
				quit: false,
				not_enqueueing: false,
				out_time_test: 0,
				idle_handler: None,
			}),
			cond: Condvar::new(),
			pool: Mutex::new(MsgPool {
				head: None,
				size: 0,
				max_size: max_pool_size,
				full: false,
			}),
			quit: AtomicBool::new(false),
		}
	}

	pub fn get_name(&self) -> String {
		self.state.lock().unwrap().name.clone()
	}

	pub fn set_queue_name(&self, name: &str) {
		self.state.lock().unwrap().name = String::from(name);
	}

	/// Insert a message, due at the absolute monotonic time `when`.
	///
	/// The pending list stays sorted by due time; a message never
	/// overtakes an earlier one with the same due time, except for
	/// `when == 0`, which is the front-of-queue code and goes ahead of
	/// everything. A closed queue rejects the message and recycles it.
	pub fn enqueue_message(&self, mut msg: Message, when: u64) -> Result<()> {
		if msg.target.is_none() {
			warn!(target: LOG_TAG, "message has no target handler and cannot be queued");
			return Err(ErrorKind::InvalidInput.into());
		}

		if msg.is_in_use() {
			warn!(target: LOG_TAG, "message is already queued");
			return Err(ErrorKind::InUse.into());
		}

		{
			let mut state = self.state.lock().unwrap();

			if state.quit || state.not_enqueueing {
				error!(target: LOG_TAG, "[{}] queue is closed, rejecting message", state.name);
				drop(state);
				self.recycle_msg(msg);
				return Err(ErrorKind::QueueClosed.into());
			}

			msg.make_in_use();
			msg.when = when;

			if when == 0 {
				msg.next = state.head.take();
				state.head = Some(msg);
			} else {
				// Walk past every entry due at or before `when` so that
				// equal due times dispatch in posting order.
				let mut slot = &mut state.head;
				loop {
					match slot {
						Some(node) if node.when <= when => {
							slot = &mut slot.as_mut().unwrap().next;
						}
						_ => break,
					}
				}
				msg.next = slot.take();
				*slot = Some(msg);
			}

			state.size += 1;
			// The new message may be due sooner than whatever the
			// consumer is waiting for.
			state.blocked = false;
			self.cond.notify_all();
		}

		Ok(())
	}

	/// Block until the head message is due and detach it.
	///
	/// Returns `None` when the queue has quit, when a safe quit has
	/// drained the list, or when the test wait time expired on an empty
	/// list. The caller owns the returned message and hands it back
	/// through `recycle_msg()` after dispatch.
	pub fn next(&self) -> Option<Message> {
		let mut state = self.state.lock().unwrap();
		loop {
			if state.quit {
				warn!(target: LOG_TAG, "[{}] queue has quit", state.name);
				return None;
			}

			if state.head.is_none() {
				if state.not_enqueueing {
					info!(target: LOG_TAG, "[{}] drained after safe quit", state.name);
					return None;
				}

				if state.out_time_test > 0 {
					let wait = Duration::from_millis(state.out_time_test);
					let (guard, result) = self.cond.wait_timeout(state, wait).unwrap();
					state = guard;
					if result.timed_out() && state.head.is_none() {
						info!(target: LOG_TAG, "[{}] test wait expired, leaving queue", state.name);
						return None;
					}
					continue;
				}

				// About to park without a deadline; let the idle
				// handler run first, with the queue unlocked.
				if let Some(idle) = state.idle_handler {
					drop(state);
					idle();
					state = self.state.lock().unwrap();
				}

				state.blocked = true;
				while state.blocked
					&& state.head.is_none()
					&& !state.quit
					&& !state.not_enqueueing
				{
					state = self.cond.wait(state).unwrap();
				}
				continue;
			}

			let now = monotonic_ms();
			let when = match state.head {
				Some(ref head) => head.when,
				None => continue,
			};

			if when <= now {
				let mut msg = match state.head.take() {
					Some(msg) => msg,
					None => continue,
				};
				state.head = msg.next.take();
				state.size -= 1;
				return Some(msg);
			}

			// Head is not due yet; sleep until it is, or until an
			// earlier message or a quit wakes us. The timeout is
			// recomputed from the absolute due time on every pass.
			let wait = Duration::from_millis(when - now);
			let (guard, _) = self.cond.wait_timeout(state, wait).unwrap();
			state = guard;
		}
	}

	/// Pop a blank message from the recycle pool, most recently recycled
	/// first.
	pub fn obtain(&self) -> Option<Message> {
		let mut pool = self.pool.lock().unwrap();
		match pool.head.take() {
			Some(mut msg) => {
				pool.head = msg.next.take();
				pool.size -= 1;
				if pool.size == 0 {
					pool.full = false;
				}
				Some(msg)
			}
			None => None,
		}
	}

	/// Blank a spent message and keep the record for reuse. The record
	/// is dropped instead when the pool is at capacity or the queue has
	/// quit. The payload is released before the pool lock is taken, so
	/// release functions never run under a lock and the pool never
	/// retains payloads.
	pub fn recycle_msg(&self, mut msg: Message) {
		msg.recycle_unchecked();

		let mut pool = self.pool.lock().unwrap();
		if self.quit.load(Ordering::Relaxed) || pool.size == pool.max_size {
			return;
		}

		msg.next = pool.head.take();
		pool.head = Some(msg);
		pool.size += 1;
		if pool.size == pool.max_size {
			pool.full = true;
		}
	}

	pub fn has_message(&self, what: i32, handler: Option<&Handler>) -> bool {
		self.has_where(|msg| msg.what == what, Self::filter_of(handler))
	}

	pub fn has_message_runnable(&self, r: Runnable, handler: Option<&Handler>) -> bool {
		self.has_where(move |msg| msg.callback == Some(r), Self::filter_of(handler))
	}

	pub fn has_message_callback(
		&self,
		callback: &Arc<dyn HandlerCallback>,
		handler: Option<&Handler>,
	) -> bool {
		self.has_where(
			move |msg| match msg.handler_callback {
				Some(ref c) => Arc::ptr_eq(c, callback),
				None => false,
			},
			Self::filter_of(handler),
		)
	}

	/// Remove every pending message with this `what`, optionally only
	/// those targeting `handler`. Returns the number of messages
	/// removed; the removed messages are recycled, releasing their
	/// payloads.
	pub fn remove_message(&self, what: i32, handler: Option<&Handler>) -> usize {
		self.remove_where(move |msg| msg.what == what, Self::filter_of(handler))
	}

	pub fn remove_message_runnable(&self, r: Runnable, handler: Option<&Handler>) -> usize {
		self.remove_where(move |msg| msg.callback == Some(r), Self::filter_of(handler))
	}

	pub fn remove_message_in_range(
		&self,
		min_what: i32,
		max_what: i32,
		r: Runnable,
		handler: Option<&Handler>,
	) -> usize {
		self.remove_where(
			move |msg| msg.what >= min_what && msg.what <= max_what && msg.callback == Some(r),
			Self::filter_of(handler),
		)
	}

	pub fn remove_message_with_args(
		&self,
		what: i32,
		arg1: i32,
		arg2: i32,
		r: Runnable,
		handler: Option<&Handler>,
	) -> usize {
		self.remove_where(
			move |msg| {
				msg.what == what
					&& msg.arg1 == arg1
					&& msg.arg2 == arg2
					&& msg.callback == Some(r)
			},
			Self::filter_of(handler),
		)
	}

	pub fn remove_callback(
		&self,
		callback: &Arc<dyn HandlerCallback>,
		handler: Option<&Handler>,
	) -> usize {
		self.remove_where(
			move |msg| Self::callback_matches(msg, callback),
			Self::filter_of(handler),
		)
	}

	pub fn remove_message_callback(
		&self,
		what: i32,
		callback: &Arc<dyn HandlerCallback>,
		handler: Option<&Handler>,
	) -> usize {
		self.remove_where(
			move |msg| msg.what == what && Self::callback_matches(msg, callback),
			Self::filter_of(handler),
		)
	}

	pub fn remove_callback_in_range(
		&self,
		min_what: i32,
		max_what: i32,
		callback: &Arc<dyn HandlerCallback>,
		handler: Option<&Handler>,
	) -> usize {
		self.remove_where(
			move |msg| {
				msg.what >= min_what
					&& msg.what <= max_what
					&& Self::callback_matches(msg, callback)
			},
			Self::filter_of(handler),
		)
	}

	pub fn remove_callback_with_args(
		&self,
		what: i32,
		arg1: i32,
		arg2: i32,
		callback: &Arc<dyn HandlerCallback>,
		handler: Option<&Handler>,
	) -> usize {
		self.remove_where(
			move |msg| {
				msg.what == what
					&& msg.arg1 == arg1
					&& msg.arg2 == arg2
					&& Self::callback_matches(msg, callback)
			},
			Self::filter_of(handler),
		)
	}

	/// Remove every pending message, or with a handler given, every
	/// pending message targeting that handler.
	pub fn remove_all_messages(&self, handler: Option<&Handler>) -> usize {
		self.remove_where(|_| true, Self::filter_of(handler))
	}

	pub(crate) fn remove_all_for_target(&self, target: &Weak<MsgHandler>) -> usize {
		self.remove_where(|_| true, Some(target))
	}

	/// Shut the queue down.
	///
	/// A hard quit (`safely == false`) detaches the whole pending list
	/// and drops it, payload release functions included; every later
	/// enqueue is rejected and `next()` returns the exit sentinel. A
	/// safe quit only stops new enqueues: the pending list is kept and
	/// the consumer drains it before `next()` returns the sentinel.
	pub fn quit(&self, safely: bool) {
		let drained;
		{
			let mut state = self.state.lock().unwrap();
			if state.quit {
				return;
			}

			if safely {
				state.not_enqueueing = true;
				state.blocked = false;
				self.cond.notify_all();
				return;
			}

			drained = state.head.take();
			state.size = 0;
			state.quit = true;
			state.blocked = false;
			self.quit.store(true, Ordering::Relaxed);
			self.cond.notify_all();
		}

		// Dropping the detached list releases every payload after the
		// lock is gone; the chain is unlinked iteratively on drop, so a
		// long backlog cannot overflow the stack.
		drop(drained);
	}

	/// An idle queue has nothing pending, or a head that is not due yet.
	pub fn is_idle(&self) -> bool {
		let state = self.state.lock().unwrap();
		let now = monotonic_ms();
		match state.head {
			Some(ref head) => head.when > now,
			None => true,
		}
	}

	pub fn get_queue_size(&self) -> usize {
		self.state.lock().unwrap().size
	}

	pub fn get_msg_pool_size(&self) -> usize {
		self.pool.lock().unwrap().size
	}

	/// Install a callable the consumer invokes, with the queue unlocked,
	/// right before it would block without a deadline. A consumer that
	/// is already parked is woken so the callable gets its first turn.
	pub fn add_idle_handler(&self, handler: IdleHandlerFn) {
		let mut state = self.state.lock().unwrap();
		state.idle_handler = Some(handler);
		state.blocked = false;
		self.cond.notify_all();
	}

	pub fn remove_idle_handler(&self) {
		self.state.lock().unwrap().idle_handler = None;
	}

	/// Test hook: a consumer finding the list empty waits at most this
	/// many milliseconds before returning the exit sentinel. Zero
	/// disables the hook.
	pub fn set_test_out_time(&self, millis: u64) {
		self.state.lock().unwrap().out_time_test = millis;
	}

	/// Log the pending list. Free-form diagnostics, not an interface.
	pub fn dump_queue_list(&self) {
		let state = self.state.lock().unwrap();
		info!(target: LOG_TAG, "------ message queue '{}' ({} pending) ------", state.name, state.size);
		let mut cursor = state.head.as_deref();
		while let Some(msg) = cursor {
			info!(
				target: LOG_TAG,
				"  message what = {}, when = {}, in use = {}",
				msg.what,
				msg.when,
				msg.is_in_use()
			);
			cursor = msg.next.as_deref();
		}
		info!(target: LOG_TAG, "------ message queue '{}' end ------", state.name);
	}

	/// Log the recycle pool. Free-form diagnostics, not an interface.
	pub fn dump_queue_pool(&self) {
		let pool = self.pool.lock().unwrap();
		info!(
			target: LOG_TAG,
			"------ message pool ({} of {}, full = {}) ------",
			pool.size,
			pool.max_size,
			pool.full
		);
		let mut cursor = pool.head.as_deref();
		while let Some(msg) = cursor {
			info!(
				target: LOG_TAG,
				"  pooled message what = {}, when = {}, in use = {}",
				msg.what,
				msg.when,
				msg.is_in_use()
			);
			cursor = msg.next.as_deref();
		}
		info!(target: LOG_TAG, "------ message pool end ------");
	}

	fn filter_of(handler: Option<&Handler>) -> Option<&Weak<MsgHandler>> {
		handler.map(|handler| handler.self_ref())
	}

	fn target_matches(msg: &Msg, target: Option<&Weak<MsgHandler>>) -> bool {
		match target {
			Some(target) => match msg.target {
				Some(ref t) => t.ptr_eq(target),
				None => false,
			},
			None => true,
		}
	}

	fn callback_matches(msg: &Msg, callback: &Arc<dyn HandlerCallback>) -> bool {
		match msg.handler_callback {
			Some(ref c) => Arc::ptr_eq(c, callback),
			None => false,
		}
	}

	fn has_where<F>(&self, pred: F, target: Option<&Weak<MsgHandler>>) -> bool
	where
		F: Fn(&Msg) -> bool,
	{
		let state = self.state.lock().unwrap();
		let mut cursor = state.head.as_deref();
		while let Some(msg) = cursor {
			if Self::target_matches(msg, target) && pred(msg) {
				return true;
			}
			cursor = msg.next.as_deref();
		}
		false
	}

	/// Detach every matching message under the queue lock, then recycle
	/// the detached messages with the lock released, so their payload
	/// release functions can call back into the queue.
	fn remove_where<F>(&self, pred: F, target: Option<&Weak<MsgHandler>>) -> usize
	where
		F: Fn(&Msg) -> bool,
	{
		let mut detached: Vec<Message> = Vec::new();
		{
			let mut state = self.state.lock().unwrap();
			let mut kept: Vec<Message> = Vec::new();
			let mut cursor = state.head.take();
			while let Some(mut msg) = cursor {
				cursor = msg.next.take();
				if Self::target_matches(&msg, target) && pred(&msg) {
					detached.push(msg);
				} else {
					kept.push(msg);
				}
			}

			state.size -= detached.len();
			let mut head = None;
			for mut msg in kept.into_iter().rev() {
				msg.next = head.take();
				head = Some(msg);
			}
			state.head = head;
		}

		let removed = detached.len();
		for msg in detached {
			self.recycle_msg(msg);
		}
		removed
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use looper::looper::MsgLooper;
	use looper::MsgHandler;
	use std::any::Any;
	use std::sync::atomic::AtomicUsize;

	fn count_release(param: Box<dyn Any + Send>, _bytes: usize) {
		if let Ok(counter) = param.downcast::<Arc<AtomicUsize>>() {
			counter.fetch_add(1, Ordering::SeqCst);
		}
	}

	fn noop(_msg: &Msg, _context: Option<&::looper::Context>) {}

	fn test_handler() -> Handler {
		let looper = MsgLooper::prepare();
		MsgHandler::create_on(&looper, None)
	}

	fn targeted(what: i32, handler: &Handler) -> Message {
		let mut msg = Msg::obtain_what(what, None);
		msg.target = Some(Arc::downgrade(handler));
		msg
	}

	#[test]
	fn enqueue_requires_target() {
		let queue = MsgQueue::new("no_target", 4);
		let msg = Msg::obtain_what(1, None);
		assert_eq!(
			queue.enqueue_message(msg, 10).unwrap_err().kind(),
			ErrorKind::InvalidInput
		);
		assert_eq!(queue.get_queue_size(), 0);
	}

	#[test]
	fn messages_come_out_in_due_time_order() {
		let queue = MsgQueue::new("ordering", 8);
		let handler = test_handler();
		let now = monotonic_ms();

		queue.enqueue_message(targeted(1, &handler), now + 30).unwrap();
		queue.enqueue_message(targeted(2, &handler), now + 10).unwrap();
		queue.enqueue_message(targeted(3, &handler), now + 20).unwrap();

		let mut order = Vec::new();
		for _ in 0..3 {
			let msg = queue.next().unwrap();
			order.push(msg.what);
			queue.recycle_msg(msg);
		}
		assert_eq!(order, vec![2, 3, 1]);
	}

	#[test]
	fn equal_due_times_dispatch_in_posting_order() {
		let queue = MsgQueue::new("fifo", 8);
		let handler = test_handler();
		let when = monotonic_ms() + 5;

		for what in 1..=4 {
			queue.enqueue_message(targeted(what, &handler), when).unwrap();
		}

		let mut order = Vec::new();
		for _ in 0..4 {
			let msg = queue.next().unwrap();
			order.push(msg.what);
			queue.recycle_msg(msg);
		}
		assert_eq!(order, vec![1, 2, 3, 4]);
	}

	#[test]
	fn front_of_queue_goes_ahead_of_pending_messages() {
		let queue = MsgQueue::new("front", 8);
		let handler = test_handler();
		let now = monotonic_ms();

		queue.enqueue_message(targeted(9, &handler), now + 50).unwrap();
		queue.enqueue_message(targeted(1, &handler), 0).unwrap();

		let msg = queue.next().unwrap();
		assert_eq!(msg.what, 1);
		queue.recycle_msg(msg);
	}

	#[test]
	fn pool_is_bounded_and_reused() {
		let queue = MsgQueue::new("pool", 4);
		let handler = test_handler();

		assert!(queue.obtain().is_none());

		for round in 0..10 {
			let now = monotonic_ms();
			let mut msg = queue.obtain().unwrap_or_else(Msg::new);
			msg.what = round;
			msg.target = Some(Arc::downgrade(&handler));
			queue.enqueue_message(msg, now).unwrap();
			let msg = queue.next().unwrap();
			queue.recycle_msg(msg);
			assert!(queue.get_msg_pool_size() <= 4);
		}
		assert_eq!(queue.get_msg_pool_size(), 1);

		// Overfill: recycle more records than the pool keeps.
		for _ in 0..10 {
			queue.recycle_msg(Msg::new());
		}
		assert_eq!(queue.get_msg_pool_size(), 4);

		// Pooled records come back blank.
		let msg = queue.obtain().unwrap();
		assert_eq!(msg.what, 0);
		assert!(!msg.is_in_use());
	}

	#[test]
	fn removal_by_what_recycles_and_reports() {
		let queue = MsgQueue::new("remove_what", 8);
		let handler = test_handler();
		let counter = Arc::new(AtomicUsize::new(0));
		let now = monotonic_ms();

		for what in &[7, 3, 7, 5] {
			let mut msg = targeted(*what, &handler);
			msg.set_param(Box::new(counter.clone()), 1, Some(count_release));
			queue.enqueue_message(msg, now + 50).unwrap();
		}

		assert!(queue.has_message(7, Some(&handler)));
		assert_eq!(queue.remove_message(7, Some(&handler)), 2);
		assert!(!queue.has_message(7, Some(&handler)));
		assert_eq!(queue.get_queue_size(), 2);
		assert_eq!(counter.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn removal_honors_the_handler_filter() {
		let queue = MsgQueue::new("remove_filter", 8);
		let first = test_handler();
		let second = test_handler();
		let now = monotonic_ms();

		queue.enqueue_message(targeted(1, &first), now + 50).unwrap();
		queue.enqueue_message(targeted(1, &second), now + 50).unwrap();

		assert_eq!(queue.remove_message(1, Some(&first)), 1);
		assert!(!queue.has_message(1, Some(&first)));
		assert!(queue.has_message(1, Some(&second)));
	}

	#[test]
	fn removal_by_runnable_and_args() {
		let queue = MsgQueue::new("remove_runnable", 8);
		let handler = test_handler();
		let now = monotonic_ms();

		let mut msg = targeted(4, &handler);
		msg.arg1 = 1;
		msg.arg2 = 2;
		msg.callback = Some(noop);
		queue.enqueue_message(msg, now + 50).unwrap();
		queue.enqueue_message(targeted(4, &handler), now + 50).unwrap();

		assert!(queue.has_message_runnable(noop, Some(&handler)));
		assert_eq!(queue.remove_message_with_args(4, 1, 2, noop, Some(&handler)), 1);
		assert!(!queue.has_message_runnable(noop, Some(&handler)));
		assert_eq!(queue.get_queue_size(), 1);

		let mut msg = targeted(6, &handler);
		msg.callback = Some(noop);
		queue.enqueue_message(msg, now + 50).unwrap();
		assert_eq!(queue.remove_message_in_range(5, 9, noop, None), 1);
		assert_eq!(queue.get_queue_size(), 1);
	}

	#[test]
	fn hard_quit_drops_pending_and_rejects_enqueues() {
		let queue = MsgQueue::new("hard_quit", 8);
		let handler = test_handler();
		let counter = Arc::new(AtomicUsize::new(0));
		let now = monotonic_ms();

		for what in 0..5 {
			let mut msg = targeted(what, &handler);
			msg.set_param(Box::new(counter.clone()), 1, Some(count_release));
			queue.enqueue_message(msg, now + 100).unwrap();
		}

		queue.quit(false);
		assert_eq!(counter.load(Ordering::SeqCst), 5);
		assert_eq!(queue.get_queue_size(), 0);
		assert!(queue.next().is_none());

		let rejected = targeted(9, &handler);
		assert_eq!(
			queue.enqueue_message(rejected, now).unwrap_err().kind(),
			ErrorKind::QueueClosed
		);

		// After a quit the pool no longer retains records.
		queue.recycle_msg(Msg::new());
		assert_eq!(queue.get_msg_pool_size(), 0);
	}

	#[test]
	fn safe_quit_keeps_pending_for_the_consumer() {
		let queue = MsgQueue::new("safe_quit", 8);
		let handler = test_handler();
		let now = monotonic_ms();

		queue.enqueue_message(targeted(1, &handler), now).unwrap();
		queue.enqueue_message(targeted(2, &handler), now).unwrap();
		queue.quit(true);

		let rejected = targeted(3, &handler);
		assert_eq!(
			queue.enqueue_message(rejected, now).unwrap_err().kind(),
			ErrorKind::QueueClosed
		);

		let mut order = Vec::new();
		while let Some(msg) = queue.next() {
			order.push(msg.what);
			queue.recycle_msg(msg);
		}
		assert_eq!(order, vec![1, 2]);
		assert!(queue.next().is_none());
	}

	#[test]
	fn empty_queue_with_test_wait_time_returns_sentinel() {
		let queue = MsgQueue::new("out_time", 8);
		queue.set_test_out_time(20);
		let started = monotonic_ms();
		assert!(queue.next().is_none());
		assert!(monotonic_ms() - started >= 20);
	}

	#[test]
	fn is_idle_reflects_the_head_due_time() {
		let queue = MsgQueue::new("idle", 8);
		let handler = test_handler();
		assert!(queue.is_idle());

		let now = monotonic_ms();
		queue.enqueue_message(targeted(1, &handler), now + 5_000).unwrap();
		assert!(queue.is_idle());

		queue.enqueue_message(targeted(2, &handler), 0).unwrap();
		assert!(!queue.is_idle());
	}
}
