//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

//! Thin shims over the OS facilities the looper kit needs: a monotonic
//! millisecond clock, thread identity, and a best-effort scheduling
//! priority bump.

pub mod time {
	use std::time::Instant;

	lazy_static! {
		static ref EPOCH: Instant = Instant::now();
	}

	/// Non-decreasing milliseconds, measured from the first call in this
	/// process.
	///
	/// The clock starts at 1: a scheduled time of 0 is reserved for
	/// front-of-queue sends and must never be produced by the clock.
	pub fn monotonic_ms() -> u64 {
		EPOCH.elapsed().as_millis() as u64 + 1
	}
}

pub mod threads {
	use libc;

	/// The OS identity of the calling thread, used to name per-thread
	/// message queues.
	#[cfg(target_os = "linux")]
	pub fn current_thread_id() -> u64 {
		unsafe { libc::syscall(libc::SYS_gettid) as u64 }
	}

	#[cfg(any(target_os = "macos", target_os = "ios"))]
	pub fn current_thread_id() -> u64 {
		let mut tid: u64 = 0;
		unsafe {
			libc::pthread_threadid_np(0, &mut tid);
		}
		tid
	}

	#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
	pub fn current_thread_id() -> u64 {
		use std::sync::atomic::{AtomicU64, Ordering};

		static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

		thread_local! {
			static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
		}

		THREAD_ID.with(|id| *id)
	}

	/// Request a small scheduling priority bump for the calling thread.
	///
	/// A loop draining its queue after a safe quit asks for this to
	/// finish faster. Best-effort: where adjusting priority is not
	/// permitted or not supported the request is silently skipped.
	#[cfg(unix)]
	pub fn promote_current_thread() {
		use std::mem;

		unsafe {
			let thread = libc::pthread_self();
			let mut policy: libc::c_int = 0;
			let mut param: libc::sched_param = mem::zeroed();
			if libc::pthread_getschedparam(thread, &mut policy, &mut param) != 0 {
				return;
			}

			param.sched_priority += 1;
			let max = libc::sched_get_priority_max(policy);
			if max >= 0 && param.sched_priority > max {
				param.sched_priority = max;
			}

			if libc::pthread_setschedparam(thread, policy, &param) != 0 {
				debug!(target: "kernel", "thread priority bump not permitted, skipping");
			}
		}
	}

	#[cfg(not(unix))]
	pub fn promote_current_thread() {}
}

#[test]
fn test_monotonic_ms() {
	use std::thread::sleep;
	use std::time::Duration;

	let a = time::monotonic_ms();
	assert!(a > 0);
	sleep(Duration::from_millis(5));
	let b = time::monotonic_ms();
	assert!(b >= a + 5);
}

#[test]
fn test_thread_ids_are_distinct() {
	use std::thread;

	let here = threads::current_thread_id();
	let there = thread::spawn(threads::current_thread_id).join().unwrap();
	assert_ne!(here, there);
	assert_eq!(here, threads::current_thread_id());
}
