use std::{
	io,
	sync::atomic::Ordering,
	time::{Duration, Instant},
};

use static_assertions::assert_impl_all;

use crate::{
	backend::{Mock, Serial},
	error::*,
	port::{CancelToken, OpenSerialOptions, Port, ReplyMode},
};

assert_impl_all!(Port<Serial>: Send);
assert_impl_all!(Port<Mock>: Send);

const IDLE: Duration = Duration::from_millis(40);

/// Open a mock port with a short idle window so tests run quickly.
fn open(mode: ReplyMode) -> Port<Mock> {
	OpenSerialOptions::new()
		.idle_window(IDLE)
		.reply_mode(mode)
		.open_mock()
}

fn mock(port: &mut Port<Mock>) -> &mut Mock {
	port.backend_mut().unwrap()
}

const TRACEBACK_REPLY: &[u8] = b"Traceback (most recent call last):\r\n  File \"<stdin>\", line 1\r\nNameError: name 'SHV' is not defined\r\n>>> ";

#[test]
fn send_command_appends_one_carriage_return() {
	let mut port = open(ReplyMode::Raw);
	port.send_command("STX").unwrap();
	assert_eq!(mock(&mut port).take_written(), b"STX\r");

	// Trailing whitespace is sent as-is.
	port.send_command("HIV 50 ").unwrap();
	assert_eq!(mock(&mut port).take_written(), b"HIV 50 \r");

	port.send_command("").unwrap();
	assert_eq!(mock(&mut port).take_written(), b"\r");
	assert_eq!(mock(&mut port).flushes(), 3);
}

#[test]
fn send_command_rejects_wide_characters_before_writing() {
	let mut port = open(ReplyMode::Raw);
	let err = port.send_command("HIV \u{2212}1").unwrap_err();
	assert!(matches!(err, Error::UnencodableCharacter(_)), "{err:?}");
	assert!(mock(&mut port).written().is_empty());

	// Single-byte characters above ASCII are fine.
	port.send_command("\u{b5}A").unwrap();
	assert_eq!(mock(&mut port).take_written(), [0xB5, b'A', b'\r']);
}

#[test]
fn query_returns_the_whole_burst() {
	let mut port = open(ReplyMode::Raw);
	mock(&mut port).append_data(b"X-RAY OFF\r\n");
	let reply = port.query("STX").unwrap();
	assert_eq!(reply.command(), "STX");
	assert_eq!(reply.as_raw(), "X-RAY OFF\r\n");
	assert_eq!(reply.trimmed(), "X-RAY OFF");
	assert_eq!(mock(&mut port).written(), b"STX\r");
}

#[test]
fn query_decodes_bytes_one_to_one() {
	let mut port = open(ReplyMode::Raw);
	mock(&mut port).append_data([b'C', b'U', b'R', b' ', 0xB5, b'A', 0xFF]);
	let reply = port.query("SCU").unwrap();
	assert_eq!(reply.as_raw(), "CUR \u{b5}A\u{ff}");
}

#[test]
fn short_gaps_do_not_split_a_reply() {
	let mut port = open(ReplyMode::Raw);
	{
		let backend = mock(&mut port);
		backend.append_data(b"HIV");
		backend.append_data_after(Duration::from_millis(10), b" 0.0");
		backend.append_data_after(Duration::from_millis(10), b"kV\r");
	}
	assert_eq!(port.wait_rx().unwrap(), "HIV 0.0kV\r");
	assert!(mock(&mut port).is_empty());
}

#[test]
fn a_long_gap_ends_the_reply() {
	let mut port = open(ReplyMode::Raw);
	{
		let backend = mock(&mut port);
		backend.append_data(b"ONE\r");
		backend.append_data_after(IDLE * 5, b"TWO\r");
	}
	assert_eq!(port.wait_rx().unwrap(), "ONE\r");
	assert!(!mock(&mut port).is_empty());

	std::thread::sleep(IDLE * 5);
	assert_eq!(port.wait_rx().unwrap(), "TWO\r");
}

#[test]
fn reader_waits_for_a_full_idle_window() {
	let mut port = open(ReplyMode::Raw);

	let start = Instant::now();
	assert_eq!(port.wait_rx().unwrap(), "");
	assert!(start.elapsed() >= IDLE);

	// Data arriving late restarts the window.
	mock(&mut port).append_data_after(IDLE / 2, b"READY");
	let start = Instant::now();
	assert_eq!(port.wait_rx().unwrap(), "READY");
	assert!(start.elapsed() >= IDLE + IDLE / 2);
}

#[test]
fn zero_poll_interval_busy_polls() {
	let mut port = OpenSerialOptions::new()
		.idle_window(IDLE)
		.poll_interval(Duration::ZERO)
		.open_mock();
	mock(&mut port).append_data(b"NORMAL\r");
	assert_eq!(port.query("SOV").unwrap().trimmed(), "NORMAL");
}

#[test]
fn raw_mode_does_not_look_for_tracebacks() {
	let mut port = open(ReplyMode::Raw);
	mock(&mut port).append_data(TRACEBACK_REPLY);
	let reply = port.query("SHV").unwrap();
	assert!(reply.as_raw().starts_with("Traceback"));
	assert!(reply.as_raw().ends_with(">>> "));
}

#[test]
fn prompt_mode_reports_tracebacks() {
	let mut port = open(ReplyMode::PromptDelimited);
	mock(&mut port).append_data(TRACEBACK_REPLY);
	let err = port.query("SHV").unwrap_err();
	let Error::DeviceCommand(err) = err else {
		panic!("unexpected error {err:?}");
	};
	assert_eq!(err.command(), "SHV");
	assert_eq!(
		err.summary(),
		"Traceback (most recent call last):;   File \"<stdin>\", line 1; NameError: name 'SHV' is not defined"
	);
}

#[test]
fn prompt_mode_cuts_the_reply_at_the_prompt() {
	let mut port = open(ReplyMode::PromptDelimited);
	{
		let backend = mock(&mut port);
		backend.append_data(b"HIV 0.0kV\r\n>");
		backend.append_data_after(Duration::from_millis(5), b">> ");
		// Never read: collection stops at the prompt.
		backend.append_data_after(Duration::from_millis(5), b"LATE");
	}
	let reply = port.query("SHV").unwrap();
	assert_eq!(reply.as_raw(), "HIV 0.0kV\r\n");
	assert_eq!(reply.trimmed(), "HIV 0.0kV");
	assert!(!mock(&mut port).is_empty());
}

#[test]
fn prompt_mode_requires_a_prompt() {
	let mut port = open(ReplyMode::PromptDelimited);
	mock(&mut port).append_data(b"HIV 0.0kV\r\n");
	let err = port.query("SHV").unwrap_err();
	let Error::MissingPrompt(err) = err else {
		panic!("unexpected error {err:?}");
	};
	assert_eq!(err.command(), "SHV");
	assert_eq!(err.reply(), "HIV 0.0kV\r\n");
}

#[test]
fn reply_mode_can_be_switched() {
	let mut port = open(ReplyMode::Raw);
	assert_eq!(port.set_reply_mode(ReplyMode::PromptDelimited), ReplyMode::Raw);
	mock(&mut port).append_data(b"XOF\r\n>>>");
	assert_eq!(port.query("XOF").unwrap().trimmed(), "XOF");
}

#[test]
fn write_errors_are_reported_and_not_retried() {
	let mut port = open(ReplyMode::Raw);
	mock(&mut port).write_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
	let err = port.query("STX").unwrap_err();
	let Error::Write(err) = err else {
		panic!("unexpected error {err:?}");
	};
	assert_eq!(err.io_error().kind(), io::ErrorKind::BrokenPipe);
	assert!(mock(&mut port).written().is_empty());

	mock(&mut port).flush_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
	let err = port.send_command("STX").unwrap_err();
	assert!(matches!(err, Error::Write(_)), "{err:?}");
}

#[test]
fn read_errors_are_reported() {
	let mut port = open(ReplyMode::Raw);
	mock(&mut port).read_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
	let err = port.query("STX").unwrap_err();
	assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe), "{err:?}");
}

#[test]
fn empty_reads_are_not_errors() {
	let mut port = open(ReplyMode::Raw);
	assert!(port.read_available(16).unwrap().is_empty());
	mock(&mut port).read_error(Some(io::Error::new(io::ErrorKind::WouldBlock, "again")));
	assert!(port.read_available(16).unwrap().is_empty());
	mock(&mut port).append_data(b"ERR 0");
	assert_eq!(port.read_available(3).unwrap(), b"ERR");
	assert_eq!(port.read_available(16).unwrap(), b" 0");
}

#[test]
fn reply_deadline_bounds_an_endless_reply() {
	let mut port = OpenSerialOptions::new()
		.idle_window(IDLE)
		.reply_deadline(Some(IDLE * 3))
		.open_mock();
	{
		let backend = mock(&mut port);
		for _ in 0..100 {
			backend.append_data_after(Duration::from_millis(5), b"AGING 3 1 YET\r");
		}
	}
	let err = port.query("DAG").unwrap_err();
	assert!(err.is_timeout());
	let err = ReplyTimeoutError::try_from(err).unwrap();
	assert!(err.as_bytes().starts_with(b"AGING 3 1 YET\r"));
}

#[test]
fn cancelled_token_stops_reading() {
	let mut port = open(ReplyMode::Raw);
	let token = CancelToken::new();
	assert!(port.set_cancel_token(token.clone()).is_none());
	token.cancel();

	mock(&mut port).append_data(b"X-RAY OFF\r\n");
	let err = port.query("STX").unwrap_err();
	assert!(matches!(err, Error::Cancelled(_)), "{err:?}");

	port.clear_cancel_token();
	assert_eq!(port.wait_rx().unwrap(), "X-RAY OFF\r\n");
}

#[test]
fn close_is_idempotent_and_releases_once() {
	let mut port = open(ReplyMode::Raw);
	let drops = mock(&mut port).drop_counter();

	port.close().unwrap();
	assert!(port.is_closed());
	assert_eq!(drops.load(Ordering::SeqCst), 1);
	port.close().unwrap();
	assert_eq!(drops.load(Ordering::SeqCst), 1);

	let err = port.query("STX").unwrap_err();
	assert!(matches!(err, Error::PortClosed(_)), "{err:?}");
	assert!(port.name().is_none());

	drop(port);
	assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn close_releases_even_if_flush_fails() {
	let mut port = open(ReplyMode::Raw);
	let drops = mock(&mut port).drop_counter();
	mock(&mut port).flush_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));

	let err = port.close().unwrap_err();
	assert!(matches!(err, Error::Write(_)), "{err:?}");
	assert!(port.is_closed());
	assert_eq!(drops.load(Ordering::SeqCst), 1);
	port.close().unwrap();
}

#[test]
fn drop_closes_the_port() {
	let port = open(ReplyMode::Raw);
	let drops = port.backend().unwrap().drop_counter();
	drop(port);
	assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn into_backend_hands_over_ownership() {
	let mut port = open(ReplyMode::Raw);
	port.send_command("RST").unwrap();
	let drops = mock(&mut port).drop_counter();
	let backend = port.into_backend().unwrap();
	assert_eq!(drops.load(Ordering::SeqCst), 0);
	assert_eq!(backend.written(), b"RST\r");
}

#[test]
fn settings_can_be_changed() {
	let mut port = open(ReplyMode::Raw);
	assert_eq!(port.idle_window(), IDLE);
	assert_eq!(port.set_idle_window(IDLE * 2), IDLE);
	assert_eq!(port.idle_window(), IDLE * 2);
	assert_eq!(port.reply_deadline(), None);
	assert_eq!(port.set_reply_deadline(Some(IDLE)), None);
	assert_eq!(port.reply_deadline(), Some(IDLE));
	assert!(!port.verbose());
	assert!(format!("{port:?}").starts_with("Port"));
}

#[test]
fn replies_carry_the_port_trace_level() {
	let mut port = open(ReplyMode::Raw);
	mock(&mut port).append_data(b"X-RAY OFF\r");
	assert_eq!(port.query("STX").unwrap().trace_level(), log::Level::Debug);

	let mut port = OpenSerialOptions::new()
		.idle_window(IDLE)
		.reply_mode(ReplyMode::PromptDelimited)
		.verbose(true)
		.open_mock();
	assert!(port.verbose());
	mock(&mut port).append_data(b"X-RAY OFF\r\n>>> ");
	let reply = port.query("STX").unwrap();
	assert_eq!(reply.trace_level(), log::Level::Info);
	assert!(reply.match_line("READY").is_err());
}
