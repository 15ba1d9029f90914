//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

use libc;
use std::{error, fmt, result, str};

/// This is a shortened version for a standard Rust result that returns a
/// looper error.
///
/// It is used throughout the API for every operation that can fail, such
/// as posting to a closed queue or asking for a looper on a thread that
/// never prepared one.
pub type Result<T> = result::Result<T, LooperError>;

/// This struct represents an Error for using this API
///
/// The error is very much based on the standard library's
/// `std::io::Error`, and roughly has the same usage and functionality.
pub struct LooperError {
	repr: Repr,
}

impl fmt::Debug for LooperError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		fmt::Debug::fmt(&self.repr, f)
	}
}

enum Repr {
	Os(i32),
	Simple(ErrorKind),
	Custom(Box<Custom>),
}

#[derive(Debug)]
struct Custom {
	kind: ErrorKind,
	error: Box<dyn error::Error + Send + Sync>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The kind of error that occured
///
/// Note that this list is not complete, there might be more error kinds
/// added in the future.
pub enum ErrorKind {
	/// The message is already sitting in a queue, so the requested
	/// operation (a second enqueue, or a recycle) is not allowed.
	InUse,
	/// This error tells that the user is supplying parameters that are
	/// not valid, for example a message without a target handler, or a
	/// loop run from a thread that does not own it.
	InvalidInput,
	/// The current thread has no looper; call `MsgLooper::prepare()`
	/// first.
	NoLooper,
	/// The queue has quit, or is draining after a safe quit, and does
	/// not accept new messages. The rejected message has been recycled.
	QueueClosed,
	/// This error is returned whenever an operation may fail because it
	/// times out.
	TimedOut,
	/// This leftover category is for any other error.
	Other,
}

impl ErrorKind {
	pub(crate) fn as_str(&self) -> &'static str {
		match *self {
			ErrorKind::InUse => "message is in use",
			ErrorKind::InvalidInput => "invalid input parameter",
			ErrorKind::NoLooper => "no looper on this thread",
			ErrorKind::QueueClosed => "message queue is closed",
			ErrorKind::TimedOut => "operation timed out",
			ErrorKind::Other => "other os error",
		}
	}
}

impl From<ErrorKind> for LooperError {
	/// This is a shortcut to create a simple error based on an
	/// `ErrorKind`.
	fn from(kind: ErrorKind) -> LooperError {
		LooperError {
			repr: Repr::Simple(kind),
		}
	}
}

impl LooperError {
	/// Create a new error with a `kind`, and a custom payload. The most
	/// common use is to attach a `String` that describes the error, but
	/// any struct that implements the `std::error::Error` trait will
	/// work.
	pub fn new<E>(kind: ErrorKind, error: E) -> LooperError
	where
		E: Into<Box<dyn error::Error + Send + Sync>>,
	{
		Self::_new(kind, error.into())
	}

	fn _new(kind: ErrorKind, error: Box<dyn error::Error + Send + Sync>) -> LooperError {
		LooperError {
			repr: Repr::Custom(Box::new(Custom { kind, error })),
		}
	}

	/// Create a new error based on the last OS Error.
	///
	/// This function can be used to create an error after calling OS
	/// functions that set the global error number on failure.
	pub fn last_os_error() -> LooperError {
		LooperError::from_raw_os_error(errno())
	}

	/// Convert a raw OS error constant to a `LooperError` object
	pub fn from_raw_os_error(code: i32) -> LooperError {
		LooperError {
			repr: Repr::Os(code),
		}
	}

	/// Convert the current error into a (lower level) OS error constant
	pub fn raw_os_error(&self) -> Option<i32> {
		match self.repr {
			Repr::Os(i) => Some(i),
			Repr::Simple(..) => None,
			Repr::Custom(_) => None,
		}
	}

	/// Get the `ErrorKind` for the current error
	pub fn kind(&self) -> ErrorKind {
		match self.repr {
			Repr::Os(e) => decode_error_kind(e),
			Repr::Simple(e) => e,
			Repr::Custom(ref e) => e.kind,
		}
	}
}

impl fmt::Debug for Repr {
	fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Repr::Os(code) => fmt
				.debug_struct("Os")
				.field("code", &code)
				.field("kind", &decode_error_kind(code))
				.finish(),
			Repr::Simple(kind) => fmt.debug_tuple("Kind").field(&kind).finish(),
			Repr::Custom(ref c) => fmt::Debug::fmt(&c, fmt),
		}
	}
}

impl fmt::Display for LooperError {
	fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		match self.repr {
			Repr::Os(code) => {
				let detail = error_string(code);
				write!(fmt, "{} (os error {})", detail, code)
			}
			Repr::Simple(kind) => write!(fmt, "{}", kind.as_str()),
			Repr::Custom(ref c) => c.error.fmt(fmt),
		}
	}
}

impl error::Error for LooperError {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		match self.repr {
			Repr::Custom(ref c) => Some(c.error.as_ref()),
			_ => None,
		}
	}
}

#[cfg(target_os = "linux")]
fn errno() -> i32 {
	unsafe { *libc::__errno_location() }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn errno() -> i32 {
	unsafe { *libc::__error() }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios")))]
fn errno() -> i32 {
	0
}

// Shamelessly taken from libstd/sys/unix/os.rs
#[cfg(unix)]
fn error_string(errno: i32) -> String {
	use libc::{c_char, c_int, size_t};
	use std::ffi::CStr;

	let mut buf = [0 as c_char; 128];

	let p = buf.as_mut_ptr();
	unsafe {
		if libc::strerror_r(errno as c_int, p, buf.len() as size_t) < 0 {
			return format!("unknown error {}", errno);
		}

		let p = p as *const _;
		str::from_utf8(CStr::from_ptr(p).to_bytes())
			.unwrap_or("invalid error string")
			.to_owned()
	}
}

#[cfg(not(unix))]
fn error_string(errno: i32) -> String {
	format!("os error {}", errno)
}

fn decode_error_kind(errno: i32) -> ErrorKind {
	match errno {
		libc::EINVAL => ErrorKind::InvalidInput,
		libc::EBUSY => ErrorKind::InUse,
		libc::ETIMEDOUT => ErrorKind::TimedOut,
		libc::EPIPE => ErrorKind::QueueClosed,
		_ => ErrorKind::Other,
	}
}

#[test]
fn test_error_kinds() {
	let e = LooperError::from(ErrorKind::QueueClosed);
	assert_eq!(e.kind(), ErrorKind::QueueClosed);
	assert!(e.raw_os_error().is_none());

	let e = LooperError::new(ErrorKind::InvalidInput, "message has no target handler");
	assert_eq!(e.kind(), ErrorKind::InvalidInput);
	assert_eq!(format!("{}", e), "message has no target handler");

	let e = LooperError::from_raw_os_error(libc::EINVAL);
	assert_eq!(e.kind(), ErrorKind::InvalidInput);
	assert_eq!(e.raw_os_error(), Some(libc::EINVAL));
}
