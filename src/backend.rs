//! Types that can exchange (read/write) bytes with a connected controller.
//!
//! The [`Backend`] trait represents all such types. Backends are byte
//! transparent: no framing or parsing happens at this layer.

use std::io;

use serialport as sp;

#[cfg(windows)]
use sp::COMPort as ExternSerial;
use sp::SerialPort;
#[cfg(unix)]
use sp::TTYPort as ExternSerial;

#[cfg(any(test, feature = "mock"))]
use std::{
	collections::VecDeque,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};

/// The placeholder name for a backend that doesn't have a name.
pub(crate) const UNKNOWN_BACKEND_NAME: &str = "<unknown backend>";

/// Types that allow reading and writing bytes with a connected controller.
///
/// Reads are expected to return promptly when no data is available, either
/// with `Ok(0)` or an error of kind [`TimedOut`](io::ErrorKind::TimedOut) or
/// [`WouldBlock`](io::ErrorKind::WouldBlock).
pub trait Backend: io::Read + io::Write + private::Sealed {
	/// Get the "name" of the backend.
	///
	/// This can be in any format, but should uniquely identify the backend
	/// instance.
	fn name(&self) -> Option<String>;
}

impl<C: Backend + ?Sized> Backend for Box<C> {
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}

impl<C: Backend + ?Sized> Backend for &mut C {
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}

/// A platform agnostic serial port backend.
//
// `serialport` exposes `COMPort` and `TTYPort` for windows and unix. Only one
// of them exists on any platform, so wrap whichever it is in a newtype rather
// than paying for dynamic dispatch or an extra type parameter.
#[derive(Debug)]
pub struct Serial(pub(crate) ExternSerial);

impl io::Read for Serial {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.0.read(buf)
	}
}

impl io::Write for Serial {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.write(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.0.flush()
	}
}

impl Backend for Serial {
	fn name(&self) -> Option<String> {
		self.0.name()
	}
}

/// A chunk of scripted reply data.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug)]
struct Chunk {
	/// How long after the previous delivery the chunk becomes readable.
	after: Duration,
	bytes: Vec<u8>,
}

/// A mock backend for use in testing.
///
/// It has the following features:
///   * It records all data written to it.
///   * It can be filled with data for reading, optionally released only after
///     a gap so that idle-time behaviour can be exercised.
///   * Specific errors can be inserted for calls to `read`, `write`, and
///     `flush`.
///   * It counts how many times it has been dropped.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug)]
pub struct Mock {
	/// Scripted data, in delivery order.
	chunks: VecDeque<Chunk>,
	/// When the last chunk was delivered, or when the current gap started.
	anchor: Option<Instant>,
	/// Everything written so far.
	written: Vec<u8>,
	/// The number of successful flushes.
	flushes: usize,
	/// The error to surface on the next read, if any. It is only surfaced once.
	read_error: Option<io::Error>,
	/// The error to surface on the next write, if any. It is only surfaced once.
	write_error: Option<io::Error>,
	/// The error to surface on the next flush, if any. It is only surfaced once.
	flush_error: Option<io::Error>,
	/// Incremented when the mock is dropped.
	drops: Arc<AtomicUsize>,
}

#[cfg(any(test, feature = "mock"))]
impl Mock {
	/// Create a new Mock backend.
	pub fn new() -> Self {
		Mock {
			chunks: VecDeque::new(),
			anchor: None,
			written: Vec::new(),
			flushes: 0,
			read_error: None,
			write_error: None,
			flush_error: None,
			drops: Arc::new(AtomicUsize::new(0)),
		}
	}

	/// Append data that is readable immediately after any data before it.
	///
	/// The data is not validated in any way.
	pub fn append_data<T: AsRef<[u8]>>(&mut self, bytes: T) {
		self.append_data_after(Duration::ZERO, bytes);
	}

	/// Append data that becomes readable `gap` after the data before it has
	/// been read (or, if there is none, `gap` after the first read attempt).
	pub fn append_data_after<T: AsRef<[u8]>>(&mut self, gap: Duration, bytes: T) {
		self.chunks.push_back(Chunk {
			after: gap,
			bytes: bytes.as_ref().to_vec(),
		});
	}

	/// Clear the read buffer.
	pub fn clear_buffer(&mut self) {
		self.chunks.clear();
		self.anchor = None;
	}

	/// Whether the mock has any data left to deliver or not.
	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty()
	}

	/// Get everything written to the mock so far.
	pub fn written(&self) -> &[u8] {
		&self.written
	}

	/// Take everything written to the mock so far.
	pub fn take_written(&mut self) -> Vec<u8> {
		std::mem::take(&mut self.written)
	}

	/// The number of successful calls to `flush`.
	pub fn flushes(&self) -> usize {
		self.flushes
	}

	/// Get a counter that is incremented each time this mock is dropped.
	pub fn drop_counter(&self) -> Arc<AtomicUsize> {
		Arc::clone(&self.drops)
	}

	/// Set the error for the next `read`, if any.
	pub fn read_error(&mut self, err: Option<io::Error>) {
		self.read_error = err;
	}

	/// Set the error for the next `write`, if any.
	pub fn write_error(&mut self, err: Option<io::Error>) {
		self.write_error = err;
	}

	/// Set the error for the next `flush`, if any.
	pub fn flush_error(&mut self, err: Option<io::Error>) {
		self.flush_error = err;
	}
}

#[cfg(any(test, feature = "mock"))]
impl Default for Mock {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Drop for Mock {
	fn drop(&mut self) {
		self.drops.fetch_add(1, Ordering::SeqCst);
	}
}

#[cfg(any(test, feature = "mock"))]
impl Backend for Mock {
	fn name(&self) -> Option<String> {
		Some(format!("<mock {:p}>", self))
	}
}

#[cfg(any(test, feature = "mock"))]
impl io::Read for Mock {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if let Some(err) = self.read_error.take() {
			return Err(err);
		}
		let now = Instant::now();
		let Some(chunk) = self.chunks.front_mut() else {
			// A real port with nothing to read times out immediately when
			// opened non-blocking.
			self.anchor = None;
			return Err(io::Error::new(
				io::ErrorKind::TimedOut,
				"Simulated timeout error",
			));
		};
		let anchor = *self.anchor.get_or_insert(now);
		if now.duration_since(anchor) < chunk.after {
			return Err(io::Error::new(
				io::ErrorKind::TimedOut,
				"Simulated timeout error",
			));
		}
		let n = buf.len().min(chunk.bytes.len());
		buf[..n].copy_from_slice(&chunk.bytes[..n]);
		chunk.bytes.drain(..n);
		// The rest of a partially read chunk is available straight away.
		chunk.after = Duration::ZERO;
		if chunk.bytes.is_empty() {
			self.chunks.pop_front();
		}
		self.anchor = Some(now);
		Ok(n)
	}
}

#[cfg(any(test, feature = "mock"))]
impl io::Write for Mock {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		if let Some(err) = self.write_error.take() {
			Err(err)
		} else {
			self.written.extend_from_slice(buf);
			Ok(buf.len())
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		if let Some(err) = self.flush_error.take() {
			Err(err)
		} else {
			self.flushes += 1;
			Ok(())
		}
	}
}

mod private {
	pub trait Sealed {}

	impl Sealed for super::Serial {}
	#[cfg(any(test, feature = "mock"))]
	impl Sealed for super::Mock {}
	impl<C: super::Backend + ?Sized> Sealed for Box<C> {}
	impl<C: super::Backend + ?Sized> Sealed for &mut C {}
}
