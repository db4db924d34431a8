//! Types defining the different options when opening a port.

use super::{Port, ReplyMode};
#[cfg(any(test, feature = "mock"))]
use crate::backend::Mock;
use crate::{
	backend::Serial,
	discovery,
	error::{Error, PortOpenError},
};
use serialport as sp;
use std::time::Duration;

/// Options for configuring and opening a serial port.
///
/// ## Example
///
/// ```rust
/// # use c8033::port::{OpenSerialOptions, ReplyMode};
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let mut port = OpenSerialOptions::new()
///     .idle_window(Duration::from_millis(150))
///     .reply_mode(ReplyMode::PromptDelimited)
///     .open("/dev/ttyUSB0")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenSerialOptions {
	/// The custom baud rate
	pub(super) baud_rate: u32,
	/// How long the line must be quiet to end a reply.
	pub(super) idle_window: Duration,
	/// How long to sleep between empty polls.
	pub(super) poll_interval: Duration,
	/// The maximum time to spend collecting a reply.
	pub(super) reply_deadline: Option<Duration>,
	/// How replies are delimited and checked.
	pub(super) reply_mode: ReplyMode,
	/// Whether to trace traffic at `Info` level.
	pub(super) verbose: bool,
}

impl OpenSerialOptions {
	/// The baud rate of the controller: 9,600.
	pub const DEFAULT_BAUD_RATE: u32 = 9_600;

	/// The default idle window: 100 ms.
	pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_millis(100);

	/// The default poll interval: 1 ms.
	pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

	/// Create a blank set of options ready for configuration.
	///
	/// The default baud rate and idle window are 9,600 and 100 ms,
	/// respectively. Replies are collected in [`ReplyMode::Raw`] with no
	/// deadline and traffic is traced at `Debug` level.
	///
	/// Equivalent to [`default`](OpenSerialOptions::default).
	pub fn new() -> Self {
		OpenSerialOptions {
			baud_rate: OpenSerialOptions::DEFAULT_BAUD_RATE,
			idle_window: OpenSerialOptions::DEFAULT_IDLE_WINDOW,
			poll_interval: OpenSerialOptions::DEFAULT_POLL_INTERVAL,
			reply_deadline: None,
			reply_mode: ReplyMode::Raw,
			verbose: false,
		}
	}

	/// Set a custom baud rate.
	///
	/// The default is 9,600, which is the only rate the controller supports.
	pub fn baud_rate(&mut self, baud_rate: u32) -> &mut Self {
		self.baud_rate = baud_rate;
		self
	}

	/// Set how long the line must be quiet before a reply is considered
	/// complete.
	///
	/// It must be longer than any pause the controller makes in the middle
	/// of a reply, and it adds directly to the latency of every query. The
	/// default is 100 ms.
	pub fn idle_window(&mut self, duration: Duration) -> &mut Self {
		self.idle_window = duration;
		self
	}

	/// Set how long to sleep between polls that return no data.
	///
	/// The sleep never extends past the end of the idle window. A zero
	/// duration polls continuously. The default is 1 ms.
	pub fn poll_interval(&mut self, duration: Duration) -> &mut Self {
		self.poll_interval = duration;
		self
	}

	/// Set the maximum time to spend collecting a single reply.
	///
	/// If `None`, a controller that never stops sending will block the
	/// caller forever. The default is `None`.
	pub fn reply_deadline(&mut self, deadline: Option<Duration>) -> &mut Self {
		self.reply_deadline = deadline;
		self
	}

	/// Set how replies are delimited and checked.
	///
	/// The default is [`ReplyMode::Raw`].
	pub fn reply_mode(&mut self, mode: ReplyMode) -> &mut Self {
		self.reply_mode = mode;
		self
	}

	/// Set whether all traffic is traced at `Info` rather than `Debug` level.
	///
	/// The default is `false`.
	pub fn verbose(&mut self, verbose: bool) -> &mut Self {
		self.verbose = verbose;
		self
	}

	/// Open a [`Serial`] port configured for the controller at the specified path.
	fn open_serial_port(&self, path: &str) -> Result<Serial, PortOpenError> {
		// The baud rate passed to `new` is ignored on some platforms, so it is
		// also set explicitly below.
		sp::new(path, self.baud_rate)
			.data_bits(sp::DataBits::Eight)
			.parity(sp::Parity::None)
			.flow_control(sp::FlowControl::None)
			.stop_bits(sp::StopBits::One)
			// Reads return straight away; the idle reader does the waiting.
			.timeout(Duration::ZERO)
			.baud_rate(self.baud_rate)
			.open_native()
			.map(Serial)
			.map_err(|e| match e.kind() {
				sp::ErrorKind::NoDevice => PortOpenError::new(
					Some(path),
					format!(
						"the device is either disconnected or already in use by another process: {}",
						e.description
					),
				),
				_ => PortOpenError::new(Some(path), e.description),
			})
	}

	/// Open the port at the specified path with the custom options.
	pub fn open(&self, path: &str) -> Result<Port<Serial>, Error> {
		let serial = self.open_serial_port(path)?;
		log::log!(
			if self.verbose {
				log::Level::Info
			} else {
				log::Level::Debug
			},
			"port: {path}"
		);
		Ok(Port::from_backend(serial, self))
	}

	/// Open the first port found by [`default_port`](discovery::default_port)
	/// with the custom options.
	///
	/// Fails with a [`PortOpenError`] if no port is found.
	pub fn open_default(&self) -> Result<Port<Serial>, Error> {
		let path = discovery::default_port().ok_or_else(PortOpenError::no_device)?;
		self.open(&path)
	}

	/// Open a port on a fresh [`Mock`] backend with the custom options.
	#[cfg(any(test, feature = "mock"))]
	pub fn open_mock(&self) -> Port<Mock> {
		Port::from_backend(Mock::new(), self)
	}
}

impl Default for OpenSerialOptions {
	fn default() -> Self {
		OpenSerialOptions::new()
	}
}
