//! Replies from the controller and matching lines within them.

use crate::error::{Error, InvalidPatternError, NoMatchError};
use regex::Regex;

/// The text received in response to a command.
///
/// The raw text is kept exactly as received. The controller separates lines
/// with `\r` (and sometimes `\r\n`), so the [`Display`](std::fmt::Display)
/// implementation and [`text`](Reply::text) normalize both to `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reply {
	/// The command that elicited the reply.
	command: Box<str>,
	/// The reply as received.
	raw: String,
	/// The level the producing port traces traffic at.
	trace_level: log::Level,
}

impl Reply {
	/// Create a reply to `command`, traced at `trace_level`.
	pub(crate) fn new(command: &str, raw: String, trace_level: log::Level) -> Self {
		Reply {
			command: command.into(),
			raw,
			trace_level,
		}
	}

	/// The level match diagnostics are logged at.
	pub(crate) fn trace_level(&self) -> log::Level {
		self.trace_level
	}

	/// Get the command that elicited the reply.
	pub fn command(&self) -> &str {
		&self.command
	}

	/// Get the reply exactly as it was received.
	pub fn as_raw(&self) -> &str {
		&self.raw
	}

	/// Consume the reply and return the raw text.
	pub fn into_raw(self) -> String {
		self.raw
	}

	/// Get the raw reply without leading or trailing whitespace.
	pub fn trimmed(&self) -> &str {
		self.raw.trim()
	}

	/// Get the reply with all line endings turned into `\n`, for display.
	pub fn text(&self) -> String {
		normalize_line_endings(&self.raw)
	}

	/// Iterate over the trimmed lines of the reply.
	///
	/// `\r\n`, `\r` and `\n` all end a line.
	pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
		self.raw
			.split('\n')
			.flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
			.map(str::trim)
	}

	/// Find the first line that starts with a match for `pattern`.
	///
	/// On failure the candidate lines are logged at the level the port traces
	/// traffic at, so a verbose port shows them at `Info`.
	///
	/// ## Example
	///
	/// ```rust
	/// # use c8033::{port::Port, backend::Backend};
	/// # fn wrapper<B: Backend>(mut port: Port<B>) -> Result<(), Box<dyn std::error::Error>> {
	/// let reply = port.query("HLP")?;
	/// let version = reply.match_line(r"Version \d+\.\d+")?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn match_line(&self, pattern: &str) -> Result<&str, Error> {
		let re = Regex::new(pattern).map_err(InvalidPatternError::new)?;
		first_match(&re, self.lines().collect(), self.trace_level).map_err(Into::into)
	}
}

impl std::fmt::Display for Reply {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.text())
	}
}

/// Turn `\r\n` and lone `\r` line endings into `\n`.
pub fn normalize_line_endings(raw: &str) -> String {
	raw.replace("\r\n", "\n").replace('\r', "\n")
}

/// Find the first line of `text` that starts with a match for `pattern`.
///
/// `text` is split on `\n` and each line is trimmed before matching. The
/// pattern only has to match a prefix of the line, not all of it.
///
/// ```rust
/// # use c8033::reply::match_line;
/// let re = regex::Regex::new(r"HIV \d").unwrap();
/// let line = match_line(&re, "> SHV\n HIV 0.0kV \n").unwrap();
/// assert_eq!(line, "HIV 0.0kV");
/// ```
pub fn match_line<'t>(pattern: &Regex, text: &'t str) -> Result<&'t str, NoMatchError> {
	first_match(
		pattern,
		text.split('\n').map(str::trim).collect(),
		log::Level::Debug,
	)
}

fn first_match<'t>(
	pattern: &Regex,
	lines: Vec<&'t str>,
	level: log::Level,
) -> Result<&'t str, NoMatchError> {
	let found = lines
		.iter()
		.copied()
		.find(|line| pattern.find(line).is_some_and(|m| m.start() == 0));
	if let Some(line) = found {
		log::debug!("match: {line}");
		return Ok(line);
	}
	log::log!(level, "failed lines {}", lines.len());
	for line in &lines {
		log::log!(level, "  {line}");
	}
	Err(NoMatchError::new(pattern.as_str()))
}

#[cfg(test)]
mod test {
	use super::*;

	const HELP: &str = "\r\nControl commands\r\nHIV_0-1300    CUR_0-300\r\nXON    XOF\r\n\r\nMicro Foucus X-Ray Controller\rVersion 1.03p 00/03/25 sat.\r";

	#[test]
	fn first_matching_line_wins() {
		let re = Regex::new(r"[A-Z]{3} ").unwrap();
		let text = "HIV 0.0kV\nCUR 0uA\n";
		assert_eq!(match_line(&re, text).unwrap(), "HIV 0.0kV");
	}

	#[test]
	fn match_is_anchored_at_line_start() {
		let re = Regex::new(r"OFF").unwrap();
		let err = match_line(&re, "X-RAY OFF\nAGING OFF").unwrap_err();
		assert_eq!(err.pattern(), "OFF");

		let re = Regex::new(r"AGING").unwrap();
		assert_eq!(match_line(&re, "X-RAY OFF\n  AGING OFF  ").unwrap(), "AGING OFF");
	}

	#[test]
	fn later_match_in_an_earlier_line_is_ignored() {
		// "READY" occurs inside the first line, but only the second starts with it.
		let re = Regex::new(r"READY").unwrap();
		assert_eq!(match_line(&re, "NOT READY\nREADY").unwrap(), "READY");
	}

	#[test]
	fn reply_lines_split_on_any_line_ending() {
		let reply = Reply::new("HLP", HELP.to_string(), log::Level::Debug);
		assert_eq!(
			reply.match_line(r"Version \d").unwrap(),
			"Version 1.03p 00/03/25 sat."
		);
		assert_eq!(reply.match_line("XON").unwrap(), "XON    XOF");
		assert!(reply.lines().any(|l| l == "Micro Foucus X-Ray Controller"));
	}

	#[test]
	fn reply_match_line_reports_bad_patterns() {
		let reply = Reply::new("HLP", HELP.to_string(), log::Level::Debug);
		let err = reply.match_line("(").unwrap_err();
		assert!(matches!(err, Error::InvalidPattern(_)), "{err:?}");
		let err = reply.match_line("PCU").unwrap_err();
		assert!(matches!(err, Error::NoMatch(_)), "{err:?}");
	}

	#[test]
	fn display_normalizes_line_endings() {
		let reply = Reply::new("STX", "X-RAY OFF\r\n> \rNEXT\r".to_string(), log::Level::Debug);
		assert_eq!(reply.to_string(), "X-RAY OFF\n> \nNEXT\n");
		assert_eq!(reply.as_raw(), "X-RAY OFF\r\n> \rNEXT\r");
		assert_eq!(reply.trimmed(), "X-RAY OFF\r\n> \rNEXT");
	}
}
