//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

use std::any::Any;
use std::sync::{Arc, Weak};

use looper::handler::MsgHandler;
use looper::looper::MsgLooper;
use looper::{Handler, Message, ParamFreeFn, Runnable};

const LOG_TAG: &str = "Message";

/// Set while the message sits in a pending queue.
pub(crate) const FLAG_IN_USE: u32 = 1 << 0;
/// Declared for asynchronous messages but not consulted anywhere yet;
/// reserved.
#[allow(dead_code)]
pub(crate) const FLAG_ASYNC: u32 = 1 << 1;

/// A polymorphic message consumer that can be carried by a message or
/// installed on a handler.
pub trait HandlerCallback: Send + Sync {
	fn on_handler(&self, msg: &Msg);
}

/// A unit of work: a tag with two auxiliary arguments, an optional
/// callable, an optional opaque payload, a target handler and a due
/// time.
///
/// Messages are obtained through the `obtain` family, which reuses spent
/// records from a queue's recycle pool before allocating new ones. A
/// message is not thread safe on its own; it is handed between threads
/// as a whole through its queue.
pub struct Msg {
	pub what: i32,
	pub arg1: i32,
	pub arg2: i32,
	pub callback: Option<Runnable>,
	pub handler_callback: Option<Arc<dyn HandlerCallback>>,
	pub(crate) target: Option<Weak<MsgHandler>>,
	pub(crate) when: u64,
	pub(crate) flags: u32,
	pub(crate) next: Option<Message>,
	param: Option<Box<dyn Any + Send>>,
	param_bytes: usize,
	param_free: Option<ParamFreeFn>,
}

impl Msg {
	pub(crate) fn new() -> Message {
		Box::new(Msg {
			what: 0,
			arg1: 0,
			arg2: 0,
			callback: None,
			handler_callback: None,
			target: None,
			when: 0,
			flags: 0,
			next: None,
			param: None,
			param_bytes: 0,
			param_free: None,
		})
	}

	/// Return a blank message, reusing a record from the current
	/// thread's queue pool when one is available.
	pub fn obtain() -> Message {
		match MsgLooper::my_looper() {
			Ok(looper) => looper.get_msg_queue().obtain().unwrap_or_else(Msg::new),
			Err(_) => Msg::new(),
		}
	}

	/// Like `obtain()`, but reuses a record from the pool of the queue
	/// this handler posts to. The target of the returned message is not
	/// set; the handler stamps it at send time.
	pub fn obtain_from(handler: &Handler) -> Message {
		handler.get_queue().obtain().unwrap_or_else(Msg::new)
	}

	pub fn obtain_runnable(r: Runnable, handler: Option<&Handler>) -> Message {
		let mut msg = Self::obtain_opt(handler);
		msg.callback = Some(r);
		msg
	}

	pub fn obtain_what(what: i32, handler: Option<&Handler>) -> Message {
		let mut msg = Self::obtain_opt(handler);
		msg.what = what;
		msg
	}

	pub fn obtain_args(what: i32, arg1: i32, arg2: i32, handler: Option<&Handler>) -> Message {
		let mut msg = Self::obtain_opt(handler);
		msg.what = what;
		msg.arg1 = arg1;
		msg.arg2 = arg2;
		msg
	}

	pub fn obtain_with_param(
		what: i32,
		arg1: i32,
		arg2: i32,
		param: Box<dyn Any + Send>,
		bytes: usize,
		free_fn: Option<ParamFreeFn>,
		handler: Option<&Handler>,
	) -> Message {
		let mut msg = Self::obtain_args(what, arg1, arg2, handler);
		msg.set_param(param, bytes, free_fn);
		msg
	}

	fn obtain_opt(handler: Option<&Handler>) -> Message {
		match handler {
			Some(handler) => Self::obtain_from(handler),
			None => Self::obtain(),
		}
	}

	/// Attach an opaque payload. The message takes ownership; `free_fn`
	/// (when given) runs exactly once when the message is recycled or
	/// destroyed, otherwise the payload is simply dropped.
	pub fn set_param(&mut self, param: Box<dyn Any + Send>, bytes: usize, free_fn: Option<ParamFreeFn>) {
		self.free_param();
		self.param = Some(param);
		self.param_bytes = bytes;
		self.param_free = free_fn;
	}

	pub fn param(&self) -> Option<&(dyn Any + Send)> {
		self.param.as_deref()
	}

	pub fn param_size(&self) -> usize {
		self.param_bytes
	}

	pub fn param_deleter(&self) -> Option<ParamFreeFn> {
		self.param_free
	}

	pub fn is_in_use(&self) -> bool {
		self.flags & FLAG_IN_USE == FLAG_IN_USE
	}

	pub(crate) fn make_in_use(&mut self) {
		self.flags |= FLAG_IN_USE;
	}

	/// Release the payload and blank the message. Refused while the
	/// message sits in a queue; the queue recycles through its own path.
	pub fn recycle(&mut self) {
		if self.is_in_use() {
			error!(target: LOG_TAG, "message is in use and cannot be recycled");
			return;
		}

		self.recycle_unchecked();
	}

	pub(crate) fn recycle_unchecked(&mut self) {
		self.free_param();
		self.what = 0;
		self.arg1 = 0;
		self.arg2 = 0;
		self.callback = None;
		self.handler_callback = None;
		self.target = None;
		self.when = 0;
		self.flags = 0;
		// `next` belongs to whichever list holds the message and is
		// cleared by that list.
	}

	fn free_param(&mut self) {
		if let Some(param) = self.param.take() {
			match self.param_free.take() {
				Some(free_fn) => free_fn(param, self.param_bytes),
				None => drop(param),
			}
		}
		self.param_bytes = 0;
		self.param_free = None;
	}
}

impl Drop for Msg {
	fn drop(&mut self) {
		self.free_param();

		// Unlink the chain iteratively; dropping a long list through
		// the owning `next` links must not recurse.
		let mut next = self.next.take();
		while let Some(mut msg) = next {
			next = msg.next.take();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	fn count_release(param: Box<dyn Any + Send>, _bytes: usize) {
		if let Ok(counter) = param.downcast::<Arc<AtomicUsize>>() {
			counter.fetch_add(1, Ordering::SeqCst);
		}
	}

	#[test]
	fn obtain_returns_blank_message() {
		let msg = Msg::obtain();
		assert_eq!(msg.what, 0);
		assert_eq!(msg.arg1, 0);
		assert_eq!(msg.arg2, 0);
		assert!(msg.callback.is_none());
		assert!(msg.handler_callback.is_none());
		assert!(!msg.is_in_use());
		assert!(msg.param().is_none());
		assert_eq!(msg.param_size(), 0);
	}

	#[test]
	fn payload_released_once_on_drop() {
		let counter = Arc::new(AtomicUsize::new(0));
		{
			let mut msg = Msg::obtain_what(7, None);
			msg.set_param(Box::new(counter.clone()), 16, Some(count_release));
			assert_eq!(msg.param_size(), 16);
		}
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn payload_released_once_on_recycle() {
		let counter = Arc::new(AtomicUsize::new(0));
		let mut msg = Msg::obtain_what(7, None);
		msg.set_param(Box::new(counter.clone()), 8, Some(count_release));
		msg.recycle();
		assert_eq!(counter.load(Ordering::SeqCst), 1);
		assert_eq!(msg.what, 0);
		assert!(msg.param().is_none());
		// The drop after a recycle must not release a second time.
		drop(msg);
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn recycle_refused_while_in_use() {
		let counter = Arc::new(AtomicUsize::new(0));
		let mut msg = Msg::obtain_what(3, None);
		msg.set_param(Box::new(counter.clone()), 4, Some(count_release));
		msg.make_in_use();
		msg.recycle();
		assert_eq!(counter.load(Ordering::SeqCst), 0);
		assert_eq!(msg.what, 3);
		msg.flags = 0;
		msg.recycle();
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn set_param_replaces_and_releases_previous() {
		let first = Arc::new(AtomicUsize::new(0));
		let second = Arc::new(AtomicUsize::new(0));
		let mut msg = Msg::obtain();
		msg.set_param(Box::new(first.clone()), 1, Some(count_release));
		msg.set_param(Box::new(second.clone()), 2, Some(count_release));
		assert_eq!(first.load(Ordering::SeqCst), 1);
		assert_eq!(second.load(Ordering::SeqCst), 0);
		drop(msg);
		assert_eq!(second.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn dropping_a_long_chain_does_not_recurse() {
		let mut head = Msg::obtain();
		for _ in 0..100_000 {
			let mut msg = Msg::obtain();
			msg.next = head.next.take();
			head.next = Some(msg);
		}
		drop(head);
	}
}
