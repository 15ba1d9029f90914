//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

use std::sync::{Arc, Mutex, Weak};

use kernel::time::monotonic_ms;
use looper::looper::MsgLooper;
use looper::message::Msg;
use looper::{
	Context, Handler, HandlerCallback, Looper, Message, MessageHandlerFn, Queue, Runnable,
};
use support::Result;

const LOG_TAG: &str = "MessageHandler";

/// The facade through which messages reach a loop.
///
/// A handler is bound to one looper for its whole life. Any thread may
/// post through it; the looper's thread calls back into
/// `dispatch_message()`. Messages posted through a handler carry a
/// non-owning reference back to it, which the removal and query
/// predicates use as a filter.
pub struct MsgHandler {
	looper: Looper,
	queue: Queue,
	self_ref: Weak<MsgHandler>,
	context: Option<Context>,
	// Written from any thread while the loop may be dispatching; never
	// held across user code.
	callables: Mutex<Callables>,
}

struct Callables {
	callback: Option<Runnable>,
	message_handler_fn: Option<MessageHandlerFn>,
	callback_obj: Option<Arc<dyn HandlerCallback>>,
}

impl MsgHandler {
	/// A handler bound to the calling thread's looper, preparing one if
	/// the thread has none yet.
	pub fn create(context: Option<Context>) -> Handler {
		let looper = MsgLooper::prepare();
		Self::create_on(&looper, context)
	}

	pub fn create_with_callback(callback: Runnable, context: Option<Context>) -> Handler {
		let handler = Self::create(context);
		handler.set_callback(Some(callback));
		handler
	}

	/// A handler bound to an explicit looper, wherever it lives.
	pub fn create_on(looper: &Looper, context: Option<Context>) -> Handler {
		Arc::new_cyclic(|self_ref| MsgHandler {
			looper: looper.clone(),
			queue: looper.get_msg_queue(),
			self_ref: self_ref.clone(),
			context: context,
			callables: Mutex::new(Callables {
				callback: None,
				message_handler_fn: None,
				callback_obj: None,
			}),
		})
	}

	pub fn create_on_with_callback(
		looper: &Looper,
		callback: Runnable,
		context: Option<Context>,
	) -> Handler {
		let handler = Self::create_on(looper, context);
		handler.set_callback(Some(callback));
		handler
	}

	pub fn get_looper(&self) -> Looper {
		self.looper.clone()
	}

	pub fn get_queue(&self) -> Queue {
		self.queue.clone()
	}

	pub fn get_callback(&self) -> Option<Runnable> {
		self.callables.lock().unwrap().callback
	}

	pub fn set_callback(&self, callback: Option<Runnable>) {
		self.callables.lock().unwrap().callback = callback;
	}

	pub fn set_msg_handler_func(&self, handler_fn: Option<MessageHandlerFn>) {
		self.callables.lock().unwrap().message_handler_fn = handler_fn;
	}

	pub fn set_msg_callback_object(&self, callback_obj: Option<Arc<dyn HandlerCallback>>) {
		self.callables.lock().unwrap().callback_obj = callback_obj;
	}

	/// Post a runnable for immediate dispatch.
	pub fn post(&self, r: Runnable) -> Result<()> {
		let mut msg = self.obtain();
		msg.callback = Some(r);
		self.send_message_delayed(msg, 0)
	}

	pub fn post_delayed(&self, r: Runnable, delay_millis: i64) -> Result<()> {
		let mut msg = self.obtain();
		msg.callback = Some(r);
		self.send_message_delayed(msg, delay_millis)
	}

	pub fn post_at_time(&self, r: Runnable, uptime_millis: u64) -> Result<()> {
		let mut msg = self.obtain();
		msg.callback = Some(r);
		self.send_message_at_time(msg, uptime_millis)
	}

	pub fn send_message(&self, msg: Message) -> Result<()> {
		self.send_message_delayed(msg, 0)
	}

	pub fn send_empty_message(&self, what: i32) -> Result<()> {
		self.send_empty_message_delayed(what, 0)
	}

	pub fn send_empty_message_delayed(&self, what: i32, delay_millis: i64) -> Result<()> {
		let mut msg = self.obtain();
		msg.what = what;
		self.send_message_delayed(msg, delay_millis)
	}

	/// Negative delays clamp to zero.
	pub fn send_message_delayed(&self, msg: Message, delay_millis: i64) -> Result<()> {
		let delay = if delay_millis < 0 { 0 } else { delay_millis as u64 };
		self.send_message_at_time(msg, monotonic_ms() + delay)
	}

	/// Schedule ahead of everything currently pending.
	pub fn send_message_at_front_of_queue(&self, msg: Message) -> Result<()> {
		self.send_message_at_time(msg, 0)
	}

	/// Every posting operation lands here: stamp the target and hand the
	/// message to the queue.
	pub fn send_message_at_time(&self, mut msg: Message, uptime_millis: u64) -> Result<()> {
		msg.target = Some(self.self_ref.clone());
		self.queue.enqueue_message(msg, uptime_millis)
	}

	/// Resolve and invoke the callable for a message. Per-message
	/// callables take precedence over the handler's defaults.
	pub fn dispatch_message(&self, msg: &Msg) {
		if let Some(callback) = msg.callback {
			callback(msg, self.context.as_ref());
			return;
		}

		if let Some(ref callback_obj) = msg.handler_callback {
			callback_obj.on_handler(msg);
			return;
		}

		let (callback, handler_fn, callback_obj) = {
			let callables = self.callables.lock().unwrap();
			(
				callables.callback,
				callables.message_handler_fn,
				callables.callback_obj.clone(),
			)
		};

		if let Some(callback) = callback {
			callback(msg, self.context.as_ref());
		} else if let Some(handler_fn) = handler_fn {
			handler_fn(msg, self.context.as_ref());
		} else if let Some(callback_obj) = callback_obj {
			callback_obj.on_handler(msg);
		} else {
			warn!(
				target: LOG_TAG,
				"message {} resolves to no callable anywhere, dropping it",
				msg.what
			);
		}
	}

	pub fn has_message(&self, what: i32) -> bool {
		let me = self.self_ref.upgrade();
		self.queue.has_message(what, me.as_ref())
	}

	pub fn has_message_runnable(&self, r: Runnable) -> bool {
		let me = self.self_ref.upgrade();
		self.queue.has_message_runnable(r, me.as_ref())
	}

	pub fn has_message_callback(&self, callback: &Arc<dyn HandlerCallback>) -> bool {
		let me = self.self_ref.upgrade();
		self.queue.has_message_callback(callback, me.as_ref())
	}

	pub fn remove_message(&self, what: i32) -> usize {
		let me = self.self_ref.upgrade();
		self.queue.remove_message(what, me.as_ref())
	}

	pub fn remove_message_runnable(&self, r: Runnable) -> usize {
		let me = self.self_ref.upgrade();
		self.queue.remove_message_runnable(r, me.as_ref())
	}

	pub fn remove_message_in_range(&self, min_what: i32, max_what: i32, r: Runnable) -> usize {
		let me = self.self_ref.upgrade();
		self.queue.remove_message_in_range(min_what, max_what, r, me.as_ref())
	}

	pub fn remove_message_with_args(&self, what: i32, arg1: i32, arg2: i32, r: Runnable) -> usize {
		let me = self.self_ref.upgrade();
		self.queue
			.remove_message_with_args(what, arg1, arg2, r, me.as_ref())
	}

	pub fn remove_callback(&self, callback: &Arc<dyn HandlerCallback>) -> usize {
		let me = self.self_ref.upgrade();
		self.queue.remove_callback(callback, me.as_ref())
	}

	pub fn remove_message_callback(&self, what: i32, callback: &Arc<dyn HandlerCallback>) -> usize {
		let me = self.self_ref.upgrade();
		self.queue.remove_message_callback(what, callback, me.as_ref())
	}

	pub fn remove_callback_in_range(
		&self,
		min_what: i32,
		max_what: i32,
		callback: &Arc<dyn HandlerCallback>,
	) -> usize {
		let me = self.self_ref.upgrade();
		self.queue
			.remove_callback_in_range(min_what, max_what, callback, me.as_ref())
	}

	pub fn remove_callback_with_args(
		&self,
		what: i32,
		arg1: i32,
		arg2: i32,
		callback: &Arc<dyn HandlerCallback>,
	) -> usize {
		let me = self.self_ref.upgrade();
		self.queue
			.remove_callback_with_args(what, arg1, arg2, callback, me.as_ref())
	}

	pub fn remove_all_messages(&self) -> usize {
		let me = self.self_ref.upgrade();
		self.queue.remove_all_messages(me.as_ref())
	}

	pub(crate) fn self_ref(&self) -> &Weak<MsgHandler> {
		&self.self_ref
	}

	fn obtain(&self) -> Message {
		self.queue.obtain().unwrap_or_else(Msg::new)
	}
}

impl Drop for MsgHandler {
	fn drop(&mut self) {
		// A queued message can no longer reach this handler; sweep the
		// leftovers so their payloads are released promptly.
		let removed = self.queue.remove_all_for_target(&self.self_ref);
		if removed > 0 {
			debug!(
				target: LOG_TAG,
				"handler destroyed with {} message(s) still queued",
				removed
			);
		}
	}
}
