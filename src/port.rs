//! Types for opening and using a serial port connected to the controller.
//!
//! The controller has no framing: commands are text terminated with a
//! carriage return and replies are free-form text with no fixed terminator.
//! A reply is therefore taken to be everything that arrives before the line
//! goes quiet for the port's [idle window](OpenSerialOptions::idle_window).
//!
//! ```rust
//! # use c8033::port::Port;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let mut port = Port::open_serial("/dev/ttyUSB0")?;
//! let reply = port.query("STX")?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

mod idle;
mod options;
#[cfg(test)]
mod test;

#[cfg(any(test, feature = "mock"))]
use crate::backend::Mock;
use crate::{
	backend::{Backend, Serial, UNKNOWN_BACKEND_NAME},
	error::{DeviceCommandError, Error, MissingPromptError, PortClosedError, WriteError},
	reply::Reply,
	text,
};
pub use idle::CancelToken;
pub use options::*;
use std::{
	io::{self, Read as _, Write as _},
	time::Duration,
};

/// The byte terminating every command.
pub const CARRIAGE_RETURN: u8 = b'\r';

/// The prompt that ends a reply in [`ReplyMode::PromptDelimited`].
pub const PROMPT: &str = ">>>";

/// The text that marks a failed command in [`ReplyMode::PromptDelimited`].
pub const TRACEBACK: &str = "Traceback (most recent call last):";

/// How replies are collected and checked.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ReplyMode {
	/// The reply is whatever arrives before the line goes idle. It is not
	/// checked for errors; callers interpret it themselves.
	#[default]
	Raw,
	/// The reply ends at a [`PROMPT`]. Replies containing a [`TRACEBACK`] are
	/// reported as a [`DeviceCommandError`].
	PromptDelimited,
}

/// A session with a controller.
///
/// The port owns its [`Backend`] for its whole life and releases it exactly
/// once, either on an explicit [`close`](Port::close) or when dropped. The
/// protocol is half-duplex, so a port performs one exchange at a time. To
/// share one between threads, wrap it in a [`Mutex`](std::sync::Mutex).
pub struct Port<B: Backend> {
	/// The underlying backend. `None` once the port is closed.
	backend: Option<B>,
	/// How long the line must be quiet before a reply is considered complete.
	idle_window: Duration,
	/// How long to sleep between polls that returned no data.
	poll_interval: Duration,
	/// The maximum time to spend collecting one reply, if any.
	reply_deadline: Option<Duration>,
	/// How replies are delimited and checked.
	reply_mode: ReplyMode,
	/// Whether to trace traffic at `Info` rather than `Debug`.
	verbose: bool,
	/// If set, cancels reading replies.
	cancel: Option<CancelToken>,
}

impl<B: Backend> std::fmt::Debug for Port<B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Port")
			.field("name", &self.name())
			.field("reply_mode", &self.reply_mode)
			.field("closed", &self.is_closed())
			.finish_non_exhaustive()
	}
}

impl Port<Serial> {
	/// Open the serial port at the specified path using the default options.
	///
	/// Alternatively, use [`Port::open_serial_options`] to customize how the port is opened.
	pub fn open_serial(path: &str) -> Result<Port<Serial>, Error> {
		OpenSerialOptions::new().open(path)
	}

	/// Open the first serial port found by [`default_port`](crate::discovery::default_port)
	/// using the default options.
	pub fn open_default() -> Result<Port<Serial>, Error> {
		OpenSerialOptions::new().open_default()
	}

	/// Get an [`OpenSerialOptions`] to customize how a serial port is opened.
	pub fn open_serial_options() -> OpenSerialOptions {
		OpenSerialOptions::default()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Port<Mock> {
	/// Open a port on a [`Mock`] backend using the default options.
	pub fn open_mock() -> Port<Mock> {
		OpenSerialOptions::new().open_mock()
	}
}

impl<B: Backend> Port<B> {
	/// Create a `Port` from a [`Backend`] type.
	fn from_backend(backend: B, options: &OpenSerialOptions) -> Self {
		Port {
			backend: Some(backend),
			idle_window: options.idle_window,
			poll_interval: options.poll_interval,
			reply_deadline: options.reply_deadline,
			reply_mode: options.reply_mode,
			verbose: options.verbose,
			cancel: None,
		}
	}

	/// The level traffic is logged at.
	fn trace_level(&self) -> log::Level {
		if self.verbose {
			log::Level::Info
		} else {
			log::Level::Debug
		}
	}

	fn display_name(&self) -> String {
		self.name()
			.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string())
	}

	/// Get the backend, or an error if the port has been closed.
	fn live_backend(&mut self) -> Result<&mut B, PortClosedError> {
		self.backend.as_mut().ok_or_else(PortClosedError::new)
	}

	/// Read whatever bytes are available, at most `max_bytes`, without waiting.
	///
	/// An empty vector means nothing was available.
	pub fn read_available(&mut self, max_bytes: usize) -> Result<Vec<u8>, Error> {
		let backend = self.live_backend()?;
		let mut buf = vec![0; max_bytes];
		match backend.read(&mut buf) {
			Ok(n) => {
				buf.truncate(n);
				Ok(buf)
			}
			Err(e)
				if matches!(
					e.kind(),
					io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
				) =>
			{
				Ok(Vec::new())
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Write all of `bytes` to the port. The write is buffered; call
	/// [`flush`](Port::flush) to push it out.
	pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
		self.live_backend()?
			.write_all(bytes)
			.map_err(|e| WriteError::new(e).into())
	}

	/// Flush any buffered writes.
	pub fn flush(&mut self) -> Result<(), Error> {
		self.live_backend()?
			.flush()
			.map_err(|e| WriteError::new(e).into())
	}

	/// Send a command. A reply is not read.
	///
	/// A carriage return is appended to `line`; nothing else is added or
	/// removed.
	///
	/// ## Example
	///
	/// ```rust
	/// # use c8033::{port::Port, backend::Backend};
	/// # fn wrapper<B: Backend>(mut port: Port<B>) -> Result<(), Box<dyn std::error::Error>> {
	/// port.send_command("XON")?;
	/// let reply = port.wait_rx()?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn send_command(&mut self, line: &str) -> Result<(), Error> {
		let mut bytes = text::to_bytes(line)?;
		bytes.push(CARRIAGE_RETURN);
		log::log!(
			self.trace_level(),
			"{} TX:   {}",
			self.display_name(),
			line.trim_end()
		);
		self.write(&bytes)?;
		self.flush()
	}

	/// Collect one reply: everything received until the line has been idle
	/// for the idle window.
	///
	/// This is also useful for draining anything the controller sent
	/// unprompted, e.g. right after opening the port.
	pub fn wait_rx(&mut self) -> Result<String, Error> {
		let bytes = self.collect_burst(false)?;
		Ok(text::to_str(&bytes))
	}

	/// Transmit a command and receive its reply.
	///
	/// In [`ReplyMode::PromptDelimited`] the reply is the text before the
	/// [`PROMPT`], and it is checked for a [`TRACEBACK`].
	///
	/// ## Example
	///
	/// ```rust
	/// # use c8033::{port::Port, backend::Backend};
	/// # fn wrapper<B: Backend>(mut port: Port<B>) -> Result<(), Box<dyn std::error::Error>> {
	/// let reply = port.query("SHV")?;
	/// assert!(reply.trimmed().starts_with("HIV"));
	/// # Ok(())
	/// # }
	/// ```
	pub fn query(&mut self, line: &str) -> Result<Reply, Error> {
		self.send_command(line)?;
		let prompted = self.reply_mode == ReplyMode::PromptDelimited;
		let raw = text::to_str(&self.collect_burst(prompted)?);
		log::log!(
			self.trace_level(),
			"{} RECV: {} chars",
			self.display_name(),
			raw.chars().count()
		);
		match self.reply_mode {
			ReplyMode::Raw => Ok(Reply::new(line, raw, self.trace_level())),
			ReplyMode::PromptDelimited => check_prompted_reply(line, raw, self.trace_level()),
		}
	}

	/// Close the port, flushing any buffered writes first.
	///
	/// The backend is released even if the flush fails. Closing an already
	/// closed port does nothing.
	pub fn close(&mut self) -> Result<(), Error> {
		let Some(mut backend) = self.backend.take() else {
			return Ok(());
		};
		log::debug!(
			"{} closed",
			backend
				.name()
				.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string())
		);
		backend.flush().map_err(|e| WriteError::new(e).into())
	}

	/// Whether the port has been closed.
	pub fn is_closed(&self) -> bool {
		self.backend.is_none()
	}

	/// Set the idle window and return the old one.
	pub fn set_idle_window(&mut self, idle_window: Duration) -> Duration {
		std::mem::replace(&mut self.idle_window, idle_window)
	}

	/// Get the idle window.
	pub fn idle_window(&self) -> Duration {
		self.idle_window
	}

	/// Set the reply deadline and return the old one.
	///
	/// If it is `None`, collecting a reply only ends once the line goes idle.
	pub fn set_reply_deadline(&mut self, deadline: Option<Duration>) -> Option<Duration> {
		std::mem::replace(&mut self.reply_deadline, deadline)
	}

	/// Get the reply deadline.
	pub fn reply_deadline(&self) -> Option<Duration> {
		self.reply_deadline
	}

	/// Set the reply mode and return the old one.
	pub fn set_reply_mode(&mut self, mode: ReplyMode) -> ReplyMode {
		std::mem::replace(&mut self.reply_mode, mode)
	}

	/// Get the reply mode.
	pub fn reply_mode(&self) -> ReplyMode {
		self.reply_mode
	}

	/// Whether traffic is traced at `Info` level.
	pub fn verbose(&self) -> bool {
		self.verbose
	}

	/// Install a token that can cancel reading replies, returning the
	/// previous one.
	///
	/// Once the token is cancelled, every read cycle fails with a
	/// [`CancelledError`](crate::error::CancelledError) until a different
	/// token is installed or it is cleared.
	pub fn set_cancel_token(&mut self, token: CancelToken) -> Option<CancelToken> {
		self.cancel.replace(token)
	}

	/// Remove the cancellation token, if any.
	pub fn clear_cancel_token(&mut self) -> Option<CancelToken> {
		self.cancel.take()
	}

	/// Get the "name" of the port's backend.
	///
	/// This is often the path passed to [`Port::open_serial`]. Closed ports
	/// have no name.
	pub fn name(&self) -> Option<String> {
		self.backend.as_ref().and_then(Backend::name)
	}

	/// Get a reference to the backend, unless the port is closed.
	pub fn backend(&self) -> Option<&B> {
		self.backend.as_ref()
	}

	/// Get a mutable reference to the backend, unless the port is closed.
	pub fn backend_mut(&mut self) -> Option<&mut B> {
		self.backend.as_mut()
	}

	/// Consume the port and return the underlying backend, unless the port
	/// is closed.
	pub fn into_backend(mut self) -> Option<B> {
		self.backend.take()
	}
}

impl<B: Backend> Drop for Port<B> {
	fn drop(&mut self) {
		if let Err(e) = self.close() {
			log::warn!("error closing port: {e}");
		}
	}
}

/// Cut a prompt-delimited reply at its prompt and check it for a traceback.
fn check_prompted_reply(
	command: &str,
	mut raw: String,
	trace_level: log::Level,
) -> Result<Reply, Error> {
	let prompt = raw.find(PROMPT);
	let before = &raw[..prompt.unwrap_or(raw.len())];
	if before.contains(TRACEBACK) {
		let terse = before.trim().replace('\r', "").replace('\n', "; ");
		return Err(DeviceCommandError::new(command.trim(), terse).into());
	}
	let Some(end) = prompt else {
		return Err(MissingPromptError::new(command, raw).into());
	};
	raw.truncate(end);
	Ok(Reply::new(command, raw, trace_level))
}
