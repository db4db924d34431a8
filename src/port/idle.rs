//! Reading a reply burst, delimited only by the line going quiet.
//!
//! The controller sends no terminator and no length, so the only sign that a
//! reply is complete is a quiet period on the line. The idle window must be
//! longer than any gap the controller leaves between bytes of one reply, and
//! it is added to the latency of every exchange. 100 ms works at 9600 baud;
//! tune it with [`OpenSerialOptions::idle_window`](super::OpenSerialOptions::idle_window).

use super::{Port, PROMPT};
use crate::{
	backend::Backend,
	error::{CancelledError, Error, ReplyTimeoutError},
};
use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Instant,
};

/// The most bytes requested from the backend per poll.
const READ_CHUNK: usize = 1024;

/// A flag that cancels reading replies on the [`Port`] it is installed on.
///
/// Clones share the same flag, so one clone can be handed to another thread
/// (or a signal handler) while the port blocks collecting a reply.
///
/// ```rust
/// # use c8033::{port::{CancelToken, Port}, backend::Backend};
/// # fn wrapper<B: Backend>(mut port: Port<B>) {
/// let token = CancelToken::new();
/// port.set_cancel_token(token.clone());
/// std::thread::spawn(move || {
///     std::thread::sleep(std::time::Duration::from_secs(5));
///     token.cancel();
/// });
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	/// Create a token that is not cancelled.
	pub fn new() -> Self {
		CancelToken::default()
	}

	/// Cancel reading. This cannot be undone.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	/// Whether the token has been cancelled.
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

impl<B: Backend> Port<B> {
	/// Collect bytes until none have arrived for the idle window.
	///
	/// If `stop_at_prompt` is set, collection also ends as soon as the
	/// [`PROMPT`] has been received.
	pub(super) fn collect_burst(&mut self, stop_at_prompt: bool) -> Result<Vec<u8>, Error> {
		let start = Instant::now();
		let mut last_activity = start;
		let mut buffer = Vec::new();
		loop {
			if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
				return Err(CancelledError::new(buffer).into());
			}

			let chunk = self.read_available(READ_CHUNK)?;
			let now = Instant::now();
			if !chunk.is_empty() {
				buffer.extend_from_slice(&chunk);
				last_activity = now;
				if stop_at_prompt && ends_burst(&buffer, chunk.len()) {
					break;
				}
			}

			let idle = now.duration_since(last_activity);
			if idle >= self.idle_window {
				break;
			}
			if let Some(deadline) = self.reply_deadline {
				if now.duration_since(start) >= deadline {
					return Err(ReplyTimeoutError::new(buffer).into());
				}
			}

			if chunk.is_empty() && !self.poll_interval.is_zero() {
				std::thread::sleep(self.poll_interval.min(self.idle_window - idle));
			}
		}
		log::trace!("burst of {} bytes", buffer.len());
		Ok(buffer)
	}
}

/// Whether the prompt appears in `buffer`, given that only its last `added`
/// bytes are new.
fn ends_burst(buffer: &[u8], added: usize) -> bool {
	let prompt = PROMPT.as_bytes();
	let from = buffer.len().saturating_sub(added + prompt.len() - 1);
	buffer[from..].windows(prompt.len()).any(|w| w == prompt)
}
