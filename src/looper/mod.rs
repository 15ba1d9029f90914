//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

//! The looper kit contains the message loop runtime: per-thread loopers,
//! timed message queues with a bounded recycle pool, and the handler
//! facade used to post to and receive dispatches from a loop.

mod handler;
mod looper;
mod message;
mod queue;
mod thread;
mod timer;

pub use self::handler::MsgHandler;
pub use self::looper::MsgLooper;
pub use self::message::{HandlerCallback, Msg};
pub use self::queue::MsgQueue;
pub use self::thread::LooperThread;
pub use self::timer::{TimerTask, TimerTaskFunc};

use std::any::Any;
use std::sync::Arc;

/// An owned message. A message belongs to exactly one place at a time:
/// the sender that obtained it, the queue it was enqueued on, the loop
/// stack during dispatch, or the recycle pool.
pub type Message = Box<Msg>;

/// Shared handle to a message queue.
pub type Queue = Arc<MsgQueue>;

/// Shared handle to a per-thread looper.
pub type Looper = Arc<MsgLooper>;

/// Shared handle to a handler bound to one looper.
pub type Handler = Arc<MsgHandler>;

/// Opaque state a handler forwards to the callables it invokes.
pub type Context = Arc<dyn Any + Send + Sync>;

/// A callable carried by a message or installed on a handler as the
/// default.
///
/// Runnables are plain function pointers so that they stay comparable;
/// the removal and query predicates match runnables by identity.
pub type Runnable = fn(msg: &Msg, context: Option<&Context>);

/// The per-handler fallback invoked for messages that carry no callable
/// of their own.
pub type MessageHandlerFn = Runnable;

/// Releases an opaque message payload. Invoked exactly once per payload,
/// whether its message is dispatched, removed, rejected or discarded at
/// shutdown.
pub type ParamFreeFn = fn(param: Box<dyn Any + Send>, bytes: usize);

/// Invoked by a queue consumer that is about to block without a
/// deadline. The return value is reserved.
pub type IdleHandlerFn = fn() -> bool;

/// Messages kept in a queue's recycle pool unless overridden.
pub const DEFAULT_MSG_POOL_SIZE: usize = 50;
