//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

//! A message loop runtime in the style of Android's `Handler`/`Looper`.
//!
//! A thread owns a `Looper` that pumps one message queue of timed
//! messages. Any thread may post work to any other thread's loop through
//! a `Handler` bound to that loop; the owning thread dispatches messages
//! in due-time order and recycles the spent records into a bounded
//! per-queue pool.

#[cfg(test)]
extern crate env_logger;
#[macro_use]
extern crate lazy_static;
extern crate libc;
#[macro_use]
extern crate log;

pub mod kernel;
pub mod looper;
pub mod support;
