//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

use std::any::Any;
use std::sync::Arc;

use looper::message::Msg;
use looper::thread::LooperThread;
use looper::{Context, Handler, MsgHandler, DEFAULT_MSG_POOL_SIZE};
use support::Result;

const TIMER_MESSAGE: i32 = 0;

/// A task scheduled on a timer.
pub trait TimerTaskFunc: Send + Sync {
	fn on_response(&self);
}

/// A one-shot timer driven by its own loop thread.
///
/// Each scheduled task becomes a delayed message on the timer's queue;
/// the loop thread invokes `on_response()` when the message comes due.
/// Tasks scheduled on one timer run sequentially on that thread.
/// Dropping the timer cancels everything still pending and joins the
/// thread.
pub struct TimerTask {
	thread: LooperThread,
	handler: Handler,
}

impl TimerTask {
	pub fn new() -> Result<TimerTask> {
		let thread = LooperThread::new("timer", DEFAULT_MSG_POOL_SIZE, false);
		let looper = thread.get_looper()?;
		let handler = MsgHandler::create_on_with_callback(&looper, on_timer_message, None);
		Ok(TimerTask {
			thread: thread,
			handler: handler,
		})
	}

	/// Run `task.on_response()` once, `timeout_millis` from now.
	pub fn schedule(&self, task: Arc<dyn TimerTaskFunc>, timeout_millis: i64) -> Result<()> {
		let mut msg = Msg::obtain_from(&self.handler);
		msg.what = TIMER_MESSAGE;
		msg.set_param(Box::new(task), 0, None);
		self.handler.send_message_delayed(msg, timeout_millis)
	}

	/// Drop every task that has not fired yet. Returns how many were
	/// cancelled.
	pub fn cancel(&self) -> usize {
		self.handler.remove_message(TIMER_MESSAGE)
	}
}

impl Drop for TimerTask {
	fn drop(&mut self) {
		self.thread.quit();
	}
}

fn on_timer_message(msg: &Msg, _context: Option<&Context>) {
	if msg.what != TIMER_MESSAGE {
		return;
	}

	if let Some(param) = msg.param() {
		if let Some(task) = param.downcast_ref::<Arc<dyn TimerTaskFunc>>() {
			task.on_response();
		}
	}
}
